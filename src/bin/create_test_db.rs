use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::macros::{date, datetime};

use trip_tally::{
    Amount, NewIncomeEntry, PasswordHash, Username, ValidatedPassword, create_income_entry,
    create_user, initialize_db, settle,
};

/// A utility for creating a test database for the trip_tally web server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// The password of both test users.
const TEST_PASSWORD: &str = "test";

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users \"admin\" and \"driver\" with the password \"{TEST_PASSWORD}\"...");

    let created_at = datetime!(2025-01-01 08:00:00);
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;

    create_user(
        Username::new("admin")?,
        password_hash.clone(),
        true,
        created_at,
        &conn,
    )?;
    let driver = create_user(
        Username::new("driver")?,
        password_hash,
        false,
        created_at,
        &conn,
    )?;

    println!("Creating income entries...");

    let settled_entries = [
        (date!(2025 - 03 - 03), "ONT8", 20_000),
        (date!(2025 - 03 - 04), "LBG8", 20_000),
        (date!(2025 - 03 - 05), "FUEL", 6_500),
        (date!(2025 - 03 - 06), "LOCAL", 10_000),
    ];

    for (entry_date, destination, cents) in settled_entries {
        let entry = NewIncomeEntry::new(
            entry_date,
            destination,
            None,
            Amount::from_cents(cents),
            false,
        )?;
        create_income_entry(driver.id, entry, datetime!(2025-03-06 18:00:00), &conn)?;
    }

    println!("Settling the first week...");
    settle(driver.id, datetime!(2025-03-07 17:30:00), &conn)?;

    let unsettled_entries = [
        NewIncomeEntry::new(
            date!(2025 - 03 - 10),
            "SBD1",
            None,
            Amount::from_cents(20_000),
            false,
        )?,
        NewIncomeEntry::new(
            date!(2025 - 03 - 11),
            "OTHER",
            Some("Riverside depot"),
            Amount::from_cents(15_050),
            false,
        )?,
        NewIncomeEntry::new(
            date!(2025 - 03 - 12),
            "FUEL",
            None,
            Amount::from_cents(7_000),
            true,
        )?,
    ];

    for entry in unsettled_entries {
        create_income_entry(driver.id, entry, datetime!(2025-03-12 18:00:00), &conn)?;
    }

    println!("Success!");

    Ok(())
}
