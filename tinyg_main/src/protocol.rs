//! The `?`/`$` input-text protocol layered on top of plain G-code lines
//! (spec.md §6): a `?`-prefixed line is a status-report request, a
//! `$`-prefixed line reads or writes one machine-config token, and
//! anything else is handed to the G-code parser unchanged.
//!
//! This lives in `tinyg_main` rather than `tinyg_core` because it's host
//! protocol, not canonical-machine semantics — `tinyg_core::submit_line`'s
//! contract is specifically "parse and execute one G-code block"
//! (spec.md §1 calls line assembly and the outer text dialect an external
//! collaborator's job).

use tinyg_common::config::AxisConfig;
use tinyg_common::position::Axis;

use tinyg_core::cycle::CycleRunner;

/// What one input line resolves to before it reaches the G-code parser.
pub enum Line<'a> {
    /// Blank after trimming: nothing to do.
    Empty,
    /// A status-report request (`?`).
    StatusQuery,
    /// A config-token read or write (`$...`).
    Config(&'a str),
    /// An ordinary G-code block, forwarded to `CycleRunner::submit_line`.
    Gcode(&'a str),
}

/// Classify one raw input line.
pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Line::Empty
    } else if trimmed == "?" {
        Line::StatusQuery
    } else if let Some(rest) = trimmed.strip_prefix('$') {
        Line::Config(rest)
    } else {
        Line::Gcode(trimmed)
    }
}

/// Build a single-line JSON status report (spec.md §6 "Status reports"):
/// machine position, feed rate, queue depth, and per-cycle timing.
pub fn status_report(cr: &CycleRunner) -> String {
    let cm = cr.canonical_machine();
    let pos = cm.position();
    let stats = cr.stats();
    serde_json::json!({
        "sr": {
            "posx": pos.0[0],
            "posy": pos.0[1],
            "posz": pos.0[2],
            "posa": pos.0[3],
            "posb": pos.0[4],
            "posc": pos.0[5],
            "feed": cm.modal.feed_rate,
            "vel": cm.modal.feed_rate,
            "qr": cr.planner_len(),
            "cycle_count": stats.cycle_count,
            "overruns": stats.overruns,
        }
    })
    .to_string()
}

/// Handle one `$`-stripped config line, returning the text to write back
/// to the host.
///
/// Supported forms:
/// - `$` or `$$`       — dump the whole machine config as JSON.
/// - `$<axis><token>`  — read one axis token, e.g. `$xvm`.
/// - `$<axis><token>=<value>` — write one axis token; takes effect on the
///   next move enqueued, since the planner reads limits from this config
///   fresh on every call.
pub fn handle_config(cr: &mut CycleRunner, rest: &str) -> String {
    let rest = rest.trim();
    if rest.is_empty() || rest == "$" {
        return match serde_json::to_string(cr.canonical_machine().config()) {
            Ok(text) => text,
            Err(e) => format!("{{\"er\":\"{e}\"}}"),
        };
    }

    let mut chars = rest.chars();
    let Some(letter) = chars.next() else {
        return "{\"er\":\"empty token\"}".to_string();
    };
    let Some(axis) = Axis::from_letter(letter.to_ascii_uppercase()) else {
        return format!("{{\"er\":\"unknown axis letter '{letter}'\"}}");
    };
    let remainder: String = chars.collect();

    if let Some((token, value)) = remainder.split_once('=') {
        let Ok(value) = value.trim().parse::<f64>() else {
            return format!("{{\"er\":\"bad numeric value '{value}'\"}}");
        };
        let config = cr.canonical_machine_mut().config_mut();
        let Some(cfg) = config.axes.iter_mut().find(|a| a.axis == axis) else {
            return format!("{{\"er\":\"axis {letter} not present in this profile\"}}");
        };
        return match set_axis_token(cfg, token.trim(), value) {
            Ok(()) => token_reply(token.trim(), value),
            Err(e) => format!("{{\"er\":\"{e}\"}}"),
        };
    }

    match cr.canonical_machine().config().axis_config(axis) {
        Some(cfg) => match get_axis_token(cfg, remainder.trim()) {
            Some(value) => token_reply(remainder.trim(), value),
            None => format!("{{\"er\":\"unknown token '{remainder}'\"}}"),
        },
        None => format!("{{\"er\":\"axis {letter} not present in this profile\"}}"),
    }
}

/// Build a `{"r":{"<token>":<value>}}` reply without relying on a
/// macro-time-constant JSON key.
fn token_reply(token: &str, value: f64) -> String {
    let mut inner = serde_json::Map::new();
    inner.insert(token.to_string(), serde_json::json!(value));
    let mut outer = serde_json::Map::new();
    outer.insert("r".to_string(), serde_json::Value::Object(inner));
    serde_json::Value::Object(outer).to_string()
}

fn get_axis_token(cfg: &AxisConfig, token: &str) -> Option<f64> {
    Some(match token {
        "vm" => cfg.velocity_max,
        "fr" => cfg.feedrate_max,
        "tm" => cfg.travel_max,
        "jm" => cfg.jerk_max,
        "am" => cfg.accel_max,
        "jd" => cfg.junction_deviation,
        "ra" => cfg.radius,
        "sv" => cfg.search_velocity,
        "lv" => cfg.latch_velocity,
        "lb" => cfg.latch_backoff,
        "zb" => cfg.zero_backoff,
        "sa" => cfg.step_angle,
        "tr" => cfg.travel_per_rev,
        "mi" => cfg.microsteps as f64,
        _ => return None,
    })
}

fn set_axis_token(cfg: &mut AxisConfig, token: &str, value: f64) -> Result<(), String> {
    match token {
        "vm" => cfg.velocity_max = value,
        "fr" => cfg.feedrate_max = value,
        "tm" => cfg.travel_max = value,
        "jm" => cfg.jerk_max = value,
        "am" => cfg.accel_max = value,
        "jd" => cfg.junction_deviation = value,
        "ra" => cfg.radius = value,
        "sv" => cfg.search_velocity = value,
        "lv" => cfg.latch_velocity = value,
        "lb" => cfg.latch_backoff = value,
        "zb" => cfg.zero_backoff = value,
        "sa" => cfg.step_angle = value,
        "tr" => cfg.travel_per_rev = value,
        "mi" => cfg.microsteps = value as u16,
        _ => return Err(format!("unknown token '{token}'")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyg_common::config::zen7x12_default;
    use tinyg_core::cycle::CycleRunner;

    fn runner() -> CycleRunner {
        CycleRunner::new(zen7x12_default(), 1000, 50_000, 16, [false; 6])
    }

    #[test]
    fn classify_recognizes_each_prefix() {
        assert!(matches!(classify("?"), Line::StatusQuery));
        assert!(matches!(classify("$xvm"), Line::Config("xvm")));
        assert!(matches!(classify("G0 X1"), Line::Gcode("G0 X1")));
        assert!(matches!(classify("   "), Line::Empty));
    }

    #[test]
    fn status_report_reflects_current_position() {
        let mut cr = runner();
        cr.submit_line("G0 X10").unwrap();
        let report = status_report(&cr);
        assert!(report.contains("\"qr\":1"));
    }

    #[test]
    fn config_get_reads_back_default_velocity() {
        let mut cr = runner();
        let reply = handle_config(&mut cr, "xvm");
        assert!(reply.contains("600"));
    }

    #[test]
    fn config_set_then_get_round_trips() {
        let mut cr = runner();
        let set_reply = handle_config(&mut cr, "xvm=900");
        assert!(set_reply.contains("900"));
        let get_reply = handle_config(&mut cr, "xvm");
        assert!(get_reply.contains("900"));
    }

    #[test]
    fn config_unknown_token_reports_error() {
        let mut cr = runner();
        let reply = handle_config(&mut cr, "xzz");
        assert!(reply.contains("\"er\""));
    }
}
