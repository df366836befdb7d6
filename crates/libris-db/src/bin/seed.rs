//! Development seed.
//!
//! Populates the database with a staff account and a small catalog for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed ./libris_dev.db
//! cargo run -p libris-db --bin seed
//!
//! # Another file and staff account
//! cargo run -p libris-db --bin seed -- --db ./data/libris.db --staff admin --password change-me-now
//! ```
//!
//! Seeding is skipped when the catalog already has books.

use std::env;

use libris_core::{AuthorInput, BookInput, Role};
use libris_db::{Database, DbConfig};

/// (name, surname, biography)
const AUTHORS: &[(&str, &str, &str)] = &[
    ("Ursula K.", "Le Guin", "American author of the Earthsea and Hainish cycles."),
    ("Stanislaw", "Lem", "Polish writer of philosophical science fiction."),
    ("Octavia E.", "Butler", "American author of the Parable and Xenogenesis series."),
    ("Italo", "Calvino", "Italian journalist and writer of short stories and novels."),
];

/// (title, isbn, author index, copies)
const BOOKS: &[(&str, &str, usize, i64)] = &[
    ("A Wizard of Earthsea", "9780547773742", 0, 3),
    ("The Left Hand of Darkness", "9780441478125", 0, 2),
    ("The Dispossessed", "9780061054884", 0, 1),
    ("Solaris", "9780156027601", 1, 2),
    ("The Cyberiad", "9780156027595", 1, 1),
    ("Kindred", "9780807083697", 2, 4),
    ("Parable of the Sower", "9781538732182", 2, 2),
    ("Invisible Cities", "9780156453806", 3, 1),
    ("If on a Winter's Night a Traveler", "9780156439619", 3, 2),
];

struct Options {
    db_path: String,
    staff_username: String,
    staff_password: String,
}

const USAGE: &str = "\
Usage: seed [--db PATH] [--staff USERNAME] [--password PASSWORD]

  -d, --db        SQLite file to fill (default: ./libris_dev.db)
  -s, --staff     staff account to create (default: admin)
  -p, --password  password for that account (default: admin-password)";

/// `None` means help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Options> {
    let mut options = Options {
        db_path: "./libris_dev.db".to_string(),
        staff_username: "admin".to_string(),
        staff_password: "admin-password".to_string(),
    };

    while let Some(flag) = args.next() {
        let slot = match flag.as_str() {
            "--db" | "-d" => &mut options.db_path,
            "--staff" | "-s" => &mut options.staff_username,
            "--password" | "-p" => &mut options.staff_password,
            "--help" | "-h" => return None,
            other => {
                eprintln!("ignoring unknown argument '{other}'");
                continue;
            }
        };
        if let Some(value) = args.next() {
            *slot = value;
        }
    }

    Some(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(options) = parse_args(env::args().skip(1)) else {
        println!("{USAGE}");
        return Ok(());
    };

    println!("Seeding {}", options.db_path);
    let db = Database::new(DbConfig::new(&options.db_path)).await?;

    let existing = db.books().list().await?.len();
    if existing > 0 {
        println!("catalog already holds {existing} books, nothing to do");
        return Ok(());
    }

    match db
        .users()
        .create(&options.staff_username, &options.staff_password, Role::Staff)
        .await
    {
        Ok(user) => println!("  staff   {}", user.username),
        Err(e) => eprintln!("  staff account not created: {e}"),
    }

    let mut author_ids = Vec::with_capacity(AUTHORS.len());
    for (name, surname, biography) in AUTHORS {
        let author = db
            .authors()
            .create(&AuthorInput {
                name: name.to_string(),
                surname: surname.to_string(),
                biography: biography.to_string(),
            })
            .await?;
        author_ids.push(author.id);
    }
    println!("  authors {}", author_ids.len());

    let mut created = 0;
    for (title, isbn, author_idx, copies) in BOOKS {
        let input = BookInput {
            title: title.to_string(),
            isbn: isbn.to_string(),
            description: format!("{} (seed data)", title),
            authors: vec![author_ids[*author_idx].clone()],
            total_copies: *copies,
            available_copies: None,
        };

        if let Err(e) = db.books().create(&input).await {
            eprintln!("  skipped {isbn}: {e}");
            continue;
        }
        created += 1;
    }

    println!("  books   {created}");

    db.close().await;
    Ok(())
}
