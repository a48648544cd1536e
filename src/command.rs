use std::sync::OnceLock;

use regex::Regex;

use crate::lookup::LegDraft;
use crate::model::{HotelStay, Meal, PointOfInterest, Record};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// New leg; coordinates are looked up before it is stored
    AddLeg(LegDraft),
    /// Replace a leg (0-based) with a new draft, looked up again
    EditLeg(usize, LegDraft),
    /// New meal, point of interest or hotel
    Add(Record),
    /// Delete a row of the current list (0-based), or the selected row
    Delete(Option<usize>),
    Undo,
    Write,
    Quit,
    ForceQuit,
    Clip,
    Fit,
    Unknown(String),
}

impl Command {
    /// Parse a command line. Record commands take `|`-separated fields.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        match name {
            "leg" => parse_leg(rest).map(Command::AddLeg),
            "e" | "edit" => parse_edit(rest),
            "meal" => parse_meal(rest).map(Command::Add),
            "poi" => parse_poi(rest).map(Command::Add),
            "hotel" => parse_hotel(rest).map(Command::Add),
            "del" | "delete" => {
                if rest.is_empty() {
                    return Ok(Command::Delete(None));
                }
                match rest.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(Command::Delete(Some(n - 1))),
                    _ => Err(format!("Invalid row: {}", rest)),
                }
            }
            "u" | "undo" => Ok(Command::Undo),
            "w" => Ok(Command::Write),
            "q" | "quit" => Ok(Command::Quit),
            "q!" => Ok(Command::ForceQuit),
            "clip" | "cp" => Ok(Command::Clip),
            "fit" => Ok(Command::Fit),
            _ => Ok(Command::Unknown(trimmed.to_string())),
        }
    }
}

fn fields(rest: &str) -> Vec<String> {
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split('|').map(|f| f.trim().to_string()).collect()
}

/// `YYYY-MM-DD`, the shape a date input produces
fn is_date(s: &str) -> bool {
    static DATE: OnceLock<Option<Regex>> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

fn date(value: &str, label: &str) -> Result<String, String> {
    if is_date(value) {
        Ok(value.to_string())
    } else {
        Err(format!("Invalid {} date: '{}' (expected YYYY-MM-DD)", label, value))
    }
}

fn required(value: &str, label: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("Missing {}", label))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn non_negative(value: &str, label: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(format!("Invalid {}: '{}'", label, value)),
    }
}

fn parse_leg(rest: &str) -> Result<LegDraft, String> {
    let f = fields(rest);
    if f.len() != 4 {
        return Err("Usage: leg DATE | START | END | HOURS".to_string());
    }
    leg_draft(&f)
}

fn parse_edit(rest: &str) -> Result<Command, String> {
    let f = fields(rest);
    if f.len() != 5 {
        return Err("Usage: edit ROW | DATE | START | END | HOURS".to_string());
    }
    let row = match f[0].parse::<usize>() {
        Ok(n) if n > 0 => n - 1,
        _ => return Err(format!("Invalid row: {}", f[0])),
    };
    Ok(Command::EditLeg(row, leg_draft(&f[1..])?))
}

/// Date, start, end and hours fields of a leg
fn leg_draft(f: &[String]) -> Result<LegDraft, String> {
    Ok(LegDraft {
        date: date(&f[0], "leg")?,
        start: required(&f[1], "start")?,
        end: required(&f[2], "end")?,
        hours: non_negative(&f[3], "hours")?,
    })
}

fn parse_meal(rest: &str) -> Result<Record, String> {
    let f = fields(rest);
    if f.len() != 2 {
        return Err("Usage: meal DATE | DESCRIPTION".to_string());
    }
    Ok(Record::Meal(Meal {
        date: date(&f[0], "meal")?,
        desc: required(&f[1], "description")?,
    }))
}

fn parse_poi(rest: &str) -> Result<Record, String> {
    let f = fields(rest);
    if !(2..=3).contains(&f.len()) {
        return Err("Usage: poi NAME | LOCATION [| NOTES]".to_string());
    }
    Ok(Record::Poi(PointOfInterest {
        name: required(&f[0], "name")?,
        location: required(&f[1], "location")?,
        notes: optional(f.get(2)),
    }))
}

fn parse_hotel(rest: &str) -> Result<Record, String> {
    let f = fields(rest);
    if !(4..=7).contains(&f.len()) {
        return Err("Usage: hotel CHECKIN | CHECKOUT | NAME | ADDRESS [| PHONE [| PRICE [| CONF]]]".to_string());
    }
    // empty or zero price means no price
    let price = match f.get(5).map(|p| p.trim_start_matches('$')) {
        None | Some("") => None,
        Some(p) => Some(non_negative(p, "price")?).filter(|n| *n > 0.0),
    };
    Ok(Record::Hotel(HotelStay {
        checkin: date(&f[0], "check-in")?,
        checkout: date(&f[1], "check-out")?,
        name: required(&f[2], "name")?,
        address: required(&f[3], "address")?,
        phone: optional(f.get(4)),
        price,
        conf: optional(f.get(6)),
    }))
}
