#![forbid(unsafe_code)]

mod application;
mod presentation;

fn main() -> onstore_core::error::Result<()> {
    application::run()
}
