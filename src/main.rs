//! waveforge CLI binary
//!
//! All logic lives in the library; main.rs only invokes `cli::run()`.

fn main() {
    // cli::run() handles all output, including errors
    if let Err(code) = waveforge::cli::run() {
        std::process::exit(code.as_i32());
    }
}
