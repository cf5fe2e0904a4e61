use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

/// Capability to choose a subset from a list of labeled options. The page
/// pipeline only ever sees this trait, so tests can substitute a
/// deterministic stub for the terminal prompt.
pub trait Picker {
    /// Returns the indices of the chosen options.
    fn pick(&self, prompt: &str, options: &[String]) -> Result<Vec<usize>>;
}

/// Interactive picker. Blocks the whole process on terminal input; the only
/// way out without a selection is aborting the process.
pub struct TerminalPicker;

impl Picker for TerminalPicker {
    fn pick(&self, prompt: &str, options: &[String]) -> Result<Vec<usize>> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        pick_from(prompt, options, &mut input, &mut io::stdout())
    }
}

fn pick_from(
    prompt: &str,
    options: &[String],
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Vec<usize>> {
    if options.is_empty() {
        // nothing to choose from, e.g. an empty related database
        return Ok(vec![]);
    }

    writeln!(output, "{prompt}")?;
    for (i, option) in options.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, option)?;
    }
    loop {
        write!(output, "Select one or more (e.g. '1 3'): ")?;
        output.flush()?;

        let mut line = String::new();
        let read = input.read_line(&mut line).context("error reading from stdin")?;
        if read == 0 {
            bail!("selection aborted");
        }

        match parse_selection(&line, options.len()) {
            Some(picks) if !picks.is_empty() => return Ok(picks),
            _ => writeln!(
                output,
                "Please enter at least one number between 1 and {}.",
                options.len()
            )?,
        }
    }
}

/// Parse whitespace or comma separated 1-based indices. `None` on any token
/// that is not a valid option number.
fn parse_selection(line: &str, len: usize) -> Option<Vec<usize>> {
    let mut picks = Vec::new();
    let tokens = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty());
    for token in tokens {
        let n: usize = token.parse().ok()?;
        if n == 0 || n > len {
            return None;
        }
        let i = n - 1;
        if !picks.contains(&i) {
            picks.push(i);
        }
    }
    Some(picks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_separated_indices() {
        assert_eq!(parse_selection("1 3\n", 3), Some(vec![0, 2]));
        assert_eq!(parse_selection("2,1\n", 3), Some(vec![1, 0]));
        assert_eq!(parse_selection("1 1 1\n", 3), Some(vec![0]));
        assert_eq!(parse_selection("\n", 3), Some(vec![]));
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert_eq!(parse_selection("0\n", 3), None);
        assert_eq!(parse_selection("4\n", 3), None);
        assert_eq!(parse_selection("one\n", 3), None);
    }

    #[test]
    fn picks_from_a_valid_line() {
        let mut input = Cursor::new("2 3\n");
        let mut output = Vec::new();
        let picks = pick_from("Choose:", &options(&["a", "b", "c"]), &mut input, &mut output);
        assert_eq!(picks.unwrap(), vec![1, 2]);
    }

    #[test]
    fn reprompts_until_at_least_one_valid_selection() {
        let mut input = Cursor::new("9\n\n1\n");
        let mut output = Vec::new();
        let picks = pick_from("Choose:", &options(&["a", "b"]), &mut input, &mut output);
        assert_eq!(picks.unwrap(), vec![0]);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("at least one number"));
    }

    #[test]
    fn eof_aborts_the_selection() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let picks = pick_from("Choose:", &options(&["a"]), &mut input, &mut output);
        assert!(picks.is_err());
    }

    #[test]
    fn no_options_means_no_selection() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let picks = pick_from("Choose:", &[], &mut input, &mut output);
        assert_eq!(picks.unwrap(), Vec::<usize>::new());
    }
}
