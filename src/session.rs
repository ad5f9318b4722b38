//! Line-oriented interactive session
//!
//! Each command changes the filter or a slider and the dashboard is rebuilt
//! from the cached datasets. The session keeps only the current inputs.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::dashboard::build_view;
use crate::error::LoadError;
use crate::filter::FilterSelection;
use crate::models::Datasets;
use crate::render::{self, Panel};
use crate::simulator::{DemandModel, SimulatorInput};

const HELP: &str = "\
commands:
  cities all | none | <city>,<city>...   change the city filter
  price <n>                              set the price slider (20-35)
  cost <n>                               set the cost slider (8-18)
  show [panel]                           render the dashboard or one panel
  help                                   this text
  quit                                   leave the session";

/// Panels re-rendered after each input change
const SUMMARY_PANELS: [Panel; 3] = [Panel::Kpis, Panel::Elasticity, Panel::Simulator];

#[derive(Debug, PartialEq)]
pub enum Reply {
    Output(String),
    Quit,
}

#[derive(Debug, Clone)]
pub struct Session {
    selection: Option<FilterSelection>,
    input: SimulatorInput,
    model: DemandModel,
}

impl Session {
    pub fn new(model: DemandModel) -> Self {
        Self {
            selection: None,
            input: SimulatorInput::default(),
            model,
        }
    }

    /// Current filter; all cities until the user picks some
    fn selection(&self, data: &Datasets) -> FilterSelection {
        self.selection
            .clone()
            .unwrap_or_else(|| FilterSelection::all(&data.sales))
    }

    fn render(&self, data: &Datasets, panels: &[Panel]) -> String {
        let view = build_view(data, &self.selection(data), &self.input, &self.model);
        render::render(&view, panels)
    }

    /// Apply one command line. Bad input yields a message, never an error.
    pub fn handle(&mut self, data: &Datasets, line: &str) -> Reply {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "" => Reply::Output(String::new()),
            "quit" | "exit" => Reply::Quit,
            "help" => Reply::Output(HELP.to_string()),
            "cities" => {
                self.selection = match arg.to_ascii_lowercase().as_str() {
                    "" => return Reply::Output(data.cities().join(", ")),
                    "all" => None,
                    "none" => Some(FilterSelection::none()),
                    _ => Some(FilterSelection::of(
                        arg.split(',').map(str::trim).filter(|c| !c.is_empty()),
                    )),
                };
                Reply::Output(self.render(data, &SUMMARY_PANELS))
            }
            "price" | "cost" => {
                let value: f64 = match arg.parse() {
                    Ok(v) => v,
                    Err(_) => return Reply::Output(format!("'{}' is not a number", arg)),
                };
                let updated = if command.eq_ignore_ascii_case("price") {
                    self.input.with_price(value)
                } else {
                    self.input.with_cost(value)
                };
                match updated {
                    Ok(input) => {
                        self.input = input;
                        Reply::Output(self.render(data, &SUMMARY_PANELS))
                    }
                    Err(e) => Reply::Output(e.to_string()),
                }
            }
            "show" => {
                if arg.is_empty() {
                    Reply::Output(self.render(data, &Panel::ALL))
                } else {
                    match arg.parse::<Panel>() {
                        Ok(panel) => Reply::Output(self.render(data, &[panel])),
                        Err(e) => Reply::Output(e),
                    }
                }
            }
            other => Reply::Output(format!("unknown command '{}'; try 'help'", other)),
        }
    }
}

/// Drive a session from `input`. The datasets are fetched for every
/// command, so a cached loader makes each fetch a lookup.
pub fn run<R, W, F>(input: R, mut output: W, model: DemandModel, datasets: F) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: Fn() -> Result<Arc<Datasets>, LoadError>,
{
    let mut session = Session::new(model);
    writeln!(output, "{}", HELP)?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let data = datasets()?;
        debug!(command = %line.trim(), "session command");
        match session.handle(&data, &line) {
            Reply::Quit => break,
            Reply::Output(text) => {
                if !text.is_empty() {
                    writeln!(output, "{}", text)?;
                }
            }
        }
        write!(output, "> ")?;
        output.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::tests::sample_data;

    fn output(reply: Reply) -> String {
        match reply {
            Reply::Output(text) => text,
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn sliders_update_the_simulator() {
        let data = sample_data();
        let mut session = Session::new(DemandModel::default());

        let text = output(session.handle(&data, "price 30"));
        // 15000 - 30 * 300 = 6000 units, 30 * 6000 revenue
        assert!(text.contains("180,000"));

        let text = output(session.handle(&data, "cost 18"));
        assert!(text.contains("72,000"));
    }

    #[test]
    fn out_of_range_slider_keeps_previous_value() {
        let data = sample_data();
        let mut session = Session::new(DemandModel::default());
        let text = output(session.handle(&data, "price 50"));
        assert!(text.contains("outside the supported range"));
        assert_eq!(session.input, SimulatorInput::default());
        assert!(output(session.handle(&data, "price abc")).contains("not a number"));
    }

    #[test]
    fn city_filter_changes_the_kpis() {
        let data = sample_data();
        let mut session = Session::new(DemandModel::default());

        let text = output(session.handle(&data, "cities none"));
        assert!(text.contains("no data"));

        let text = output(session.handle(&data, "cities Mumbai"));
        assert!(text.contains("140,000"));

        output(session.handle(&data, "cities all"));
        assert_eq!(session.selection(&data), FilterSelection::all(&data.sales));

        assert_eq!(output(session.handle(&data, "cities")), "Delhi, Mumbai, Pune");
    }

    #[test]
    fn show_and_unknown_commands() {
        let data = sample_data();
        let mut session = Session::new(DemandModel::default());
        assert!(output(session.handle(&data, "show costs")).contains("Cost Structure Breakdown"));
        assert!(output(session.handle(&data, "show nothing")).contains("unknown panel"));
        assert!(output(session.handle(&data, "dance")).contains("unknown command"));
        assert_eq!(session.handle(&data, "quit"), Reply::Quit);
    }

    #[test]
    fn run_fetches_datasets_for_every_command() {
        let calls = std::cell::Cell::new(0);
        let data = Arc::new(sample_data());
        let script = "price 21\nshow insight\nquit\nprice 22\n";
        let mut out = Vec::new();

        run(script.as_bytes(), &mut out, DemandModel::default(), || {
            calls.set(calls.get() + 1);
            Ok(Arc::clone(&data))
        })
        .unwrap();

        assert_eq!(calls.get(), 3);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Segment-based pricing"));
    }
}
