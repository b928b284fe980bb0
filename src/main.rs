//! specforge CLI binary
//!
//! Minimal entrypoint; all logic lives in the library and main.rs only
//! invokes `cli::run()`.

fn main() {
    // cli::run() handles ALL output including errors
    if let Err(code) = specforge::cli::run() {
        std::process::exit(code.as_i32());
    }
}
