use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;
use rust_decimal_macros::dec;
use time::{Duration, OffsetDateTime};

use eetlijst::{
    Actor, LedgerConfig, PendingTransaction, add_dining_entry, add_membership,
    create_association, create_dining_list, create_pending_transaction, create_user,
    finalise_transaction, finalise_up_to, initialize_db, track_dining_list,
};

/// A utility for creating a test database for the eetlijst application.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

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

    let config = LedgerConfig::default();

    println!("Creating test users and associations...");
    let association = create_association("Quadrivium", &conn)?;
    let cook = create_user("Piet", &conn)?;
    let anne = create_user("Anne", &conn)?;
    let bram = create_user("Bram", &conn)?;
    for user in [cook.id, anne.id, bram.id] {
        add_membership(user, association.id, &conn)?;
    }

    println!("Topping up balances...");
    for user in [cook.id, anne.id, bram.id] {
        let top_up = create_pending_transaction(
            PendingTransaction::build(dec!(20.00), "Initial deposit")
                .source(Actor::Association(association.id))
                .target(Actor::User(user)),
            &config,
            &conn,
        )?;
        finalise_transaction(top_up.id, &conn)?;
    }

    println!("Creating dining lists...");
    let today = OffsetDateTime::now_utc().date();

    let settled = create_dining_list(today - Duration::days(7), association.id, cook.id, &conn)?;
    for user in [cook.id, anne.id, bram.id] {
        add_dining_entry(settled.id, user, dec!(3.50), &conn)?;
    }
    track_dining_list(settled.id, &conn)?;
    finalise_up_to(settled.date, &conn)?;

    let open = create_dining_list(today, association.id, anne.id, &conn)?;
    for user in [anne.id, bram.id] {
        add_dining_entry(open.id, user, dec!(4.25), &conn)?;
    }
    track_dining_list(open.id, &conn)?;

    println!("Success!");

    Ok(())
}
