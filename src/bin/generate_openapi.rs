//! Dumps the service's OpenAPI document as pretty-printed JSON.
//!
//! Writes to the path given as the first argument, or to stdout when none
//! is given:
//!
//!   cargo run --bin generate_openapi -- openapi.json

use std::{env, fs, process::ExitCode};

use plant_monitor_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> ExitCode {
    let json = match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("could not serialise OpenAPI document: {e}");
            return ExitCode::FAILURE;
        }
    };

    match env::args().nth(1) {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("could not write {path}: {e}");
                return ExitCode::FAILURE;
            }
            eprintln!("OpenAPI document written to {path}");
        }
        None => println!("{json}"),
    }

    ExitCode::SUCCESS
}
