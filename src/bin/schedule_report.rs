use anyhow::Result;
use chrono::{DateTime, Utc};
use std::env;
use study_forge::database::Database;
use study_forge::models::Flashcard;

#[derive(Debug, Default)]
struct ReportStats {
    total_cards: usize,
    due_now: usize,
    never_reviewed: usize,
}

impl ReportStats {
    fn record(&mut self, card: &Flashcard, now: DateTime<Utc>) {
        self.total_cards += 1;
        if card.next_review_date <= now {
            self.due_now += 1;
        }
        if card.repetition_number == 0 {
            self.never_reviewed += 1;
        }
    }

    fn print_summary(&self) {
        println!("\n=== Summary ===");
        println!("Flashcards examined: {}", self.total_cards);
        println!("Due now: {}", self.due_now);
        println!("Never reviewed: {}", self.never_reviewed);
    }
}

fn print_card(card: &Flashcard, now: DateTime<Utc>) {
    let marker = if card.next_review_date <= now { "DUE" } else { "   " };
    println!(
        "{} {} | reps {:>2} | interval {:>6.1}d | ease {:.2} | next {} | {}",
        marker,
        card.id,
        card.repetition_number,
        card.interval,
        card.ease_factor,
        card.next_review_date.format("%Y-%m-%d %H:%M"),
        card.question.chars().take(60).collect::<String>()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let due_only = args.contains(&"--due-only".to_string());

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:study_forge.db".to_string());

    println!("=== Flashcard Schedule Report ===");
    println!("Database: {}", database_url);
    if due_only {
        println!("Showing due flashcards only");
    }

    let db = Database::new(&database_url).await?;
    let now = Utc::now();
    let mut stats = ReportStats::default();

    for card in db.list_all_flashcards().await? {
        stats.record(&card, now);
        if !due_only || card.next_review_date <= now {
            print_card(&card, now);
        }
    }

    stats.print_summary();
    Ok(())
}
