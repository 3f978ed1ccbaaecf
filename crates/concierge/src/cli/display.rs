//! Display formatting utilities for CLI output

use colored::*;

use crate::analytics::AnalyticsView;
use crate::history::HistoryEntry;
use crate::resolver::BookingProjection;

pub fn display_projection(booking: &BookingProjection) {
  let canceled = if booking.canceled { "yes".red() } else { "no".green() };

  println!("{} {}", "🏨".cyan(), booking.hotel.blue().bold());
  println!("  {:<10} {}", "Arrival:".dimmed(), booking.arrival_date);
  println!("  {:<10} {}", "Country:".dimmed(), booking.country.yellow());
  println!("  {:<10} {:.2}€", "Price:".dimmed(), booking.price);
  println!("  {:<10} {}", "Canceled:".dimmed(), canceled);
}

pub fn display_analytics(view: &AnalyticsView) {
  match view {
    AnalyticsView::RevenueTrends(months) => {
      println!("{}", "Revenue by month".blue().bold());
      for (month, revenue) in months {
        println!("  {month}  {revenue:>14.2}€");
      }
    }
    AnalyticsView::CancellationRate(rate) => {
      println!("{} {}", "Cancellation rate:".blue().bold(), rate.yellow());
    }
    AnalyticsView::TopCountries(countries) => {
      println!("{}", "Top countries".blue().bold());
      for (rank, entry) in countries.iter().enumerate() {
        println!("  {}. {:<8} {}", rank + 1, entry.country.yellow(), entry.count);
      }
    }
    AnalyticsView::LeadTimeDistribution(average) => {
      println!("{} {average:.2} days", "Average lead time:".blue().bold());
    }
  }
}

pub fn display_history(entries: &[HistoryEntry]) {
  if entries.is_empty() {
    println!("No questions recorded yet.");
    return;
  }

  for entry in entries {
    println!(
      "{} {}",
      entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
      entry.question.bold()
    );
    println!("  {}", summarize_response(&entry.response));
  }
}

fn summarize_response(response: &serde_json::Value) -> String {
  if let Some(error) = response.get("error").and_then(|e| e.as_str()) {
    return format!("error: {error}");
  }

  let field = |name: &str| match response.get(name) {
    Some(serde_json::Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
    None => "?".to_string(),
  };
  format!("{} on {} ({})", field("hotel"), field("arrival_date"), field("country"))
}
