use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use ansi_term::Colour;
use serde::Serialize;
use crate::analyser::containers::Evaluation;
use crate::analyser::decay::AggregatorState;
use crate::analyser::error::Result;

pub fn print_evaluation(evaluation: &Evaluation) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} {}", evaluation.policy);
    println!("\u{2503}");

    for (label, score) in &evaluation.scores {
        let counts = score.counts;
        let line = format!(
            "{label:<20}: F1 {:.4}  (p {:.4}, r {:.4}, tp {}, fp {}, fn {})",
            score.f1, score.precision, score.recall, counts.tp, counts.fp, counts.fn_
        );
        if counts.seen_as_truth() {
            println!("\u{2503} {}", Colour::Fixed(226).paint(line));
        } else {
            // Only ever predicted, not part of the mean
            println!("\u{2503} {}", Colour::Fixed(245).paint(line));
        }
    }

    println!("\u{2503}");
    match evaluation.mean_f1 {
        Some(mean) => println!("\u{2503} Mean F1             : {}", Colour::Red.paint(format!("{mean:.4}"))),
        None => println!("\u{2503} Mean F1             : {}", Colour::Red.paint("n/a")),
    }
    println!("\u{2503} ");
}

pub fn print_representations(states: &BTreeMap<&str, &AggregatorState>) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Representations");
    for (entity, state) in states {
        println!("\u{2503}");
        println!("\u{2503} Entity {}", Colour::Red.paint(*entity));
        println!("\u{2503} Last update      : {}", Colour::Fixed(226).paint(format_timestamp(state.last_update)));
        println!("\u{2503} Representation   : {}", Colour::Fixed(226).paint(format!("{:?}", state.vector)));
    }
    println!("\u{2503} ");
}

/// RFC 3339 rendering of a seconds timestamp, falling back to the raw number.
pub fn format_timestamp(seconds: f64) -> String {
    let micros = (seconds * 1_000_000.0).round() as i64;
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(ts) => ts.to_rfc3339(),
        None => seconds.to_string(),
    }
}

pub fn data_as_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn data_to_file(json: String, path: &Path) -> Result<()> {
    log::info!("Writing {}", path.display());
    fs::write(path, json)?;
    Ok(())
}
