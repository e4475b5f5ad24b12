//! Human-readable terminal output for zones, visits, and capture states.

use std::collections::HashSet;

use citystamp_core::{VisitState, Zone};

/// Print the zone catalog as a vertical list.
pub fn print_zone_list(zones: &[Zone]) {
    if zones.is_empty() {
        println!("No zones published.");
        return;
    }
    for zone in zones {
        println!("=== {} ===", zone.name);
        println!("  {:<12} {}", "id", zone.id);
        println!(
            "  {:<12} {:.6}, {:.6}",
            "center", zone.coordinates.lat, zone.coordinates.lng
        );
        println!("  {:<12} {} m", "radius", zone.radius);
        if !zone.description.is_empty() {
            println!("  {:<12} {}", "description", zone.description);
        }
        println!();
    }
}

/// Print the collected zone ids, sorted for stable output.
pub fn print_visits(visits: &HashSet<String>) {
    if visits.is_empty() {
        println!("No visits collected yet.");
        return;
    }
    let mut ids: Vec<&String> = visits.iter().collect();
    ids.sort();
    println!("Collected {} zone(s):", ids.len());
    for id in ids {
        println!("  {id}");
    }
}

/// Explain the capture's visit state to the user.
pub fn print_state(state: VisitState, zone: Option<&Zone>) {
    match state {
        VisitState::LocationUnavailable => {
            println!("Location unavailable – we can't confirm your visit.");
        }
        VisitState::OutOfZone => {
            println!("So close! Your photo is great, but it looks like you're just a bit too far.");
            println!("Get a little closer to the spot and try again!");
        }
        VisitState::CheckingHistory => {
            println!("Checking your previous visits…");
        }
        VisitState::AlreadyCollected => match zone {
            Some(zone) => println!("You already collected {}.", zone.name),
            None => println!("You already collected this zone."),
        },
        VisitState::JustCollected => {
            println!("Your visit has been confirmed!");
        }
        VisitState::Submitting => {
            println!("Submitting…");
        }
        VisitState::ReadyToCollect => match zone {
            Some(zone) => println!("Welcome to {}!", zone.name),
            None => println!("Ready to collect."),
        },
    }
}
