use alloy::primitives::{utils::parse_units, U256};
use floodgate_core::{engine::RunOutput, funding::FundingReport};
use nu_ansi_term::{AnsiGenericString, Color, Style};

pub fn bold<'a>(msg: impl AsRef<str> + 'a) -> AnsiGenericString<'a, str> {
    Style::new().bold().paint(msg.as_ref().to_owned())
}

/// Parses an amount with an optional unit, e.g. `0.001 eth`, `5gwei` or `100`
/// (plain numbers are wei).
pub fn parse_amount(input: &str) -> Result<U256, String> {
    let input = input.trim();
    let split = input.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(input.len());
    let (number, unit) = input.split_at(split);
    let unit = if unit.is_empty() { "wei" } else { unit.trim() };
    parse_units(number.trim(), unit)
        .map(|units| units.get_absolute())
        .map_err(|e| format!("invalid amount '{input}': {e}"))
}

pub fn print_funding_report(report: &FundingReport) {
    println!(
        "{} {} of {} account(s) ready ({} already funded, {} funded now, {} failed, {} over budget)",
        bold(format!("[{}]", report.resource)),
        report.ready.len(),
        report.requested,
        report.already_funded.len(),
        report.funded.len(),
        report.failed.len(),
        report.unfunded.len(),
    );
    for err in &report.errors {
        println!("  {}", Color::Yellow.paint(err));
    }
}

pub fn print_run_summary(output: &RunOutput, requested_accounts: usize) {
    println!("{}", bold("run summary"));
    for (sender, outcome) in &output.by_sender {
        let line = format!(
            "  {sender}: {} sent, {} failed",
            outcome.identifiers.len(),
            outcome.errors.len()
        );
        if outcome.errors.is_empty() {
            println!("{line}");
        } else {
            println!("{}", Color::Yellow.paint(line));
            if let Some(first) = outcome.errors.first() {
                println!("    first error: {first}");
            }
        }
    }
    let (identifiers, errors) = output.totals();
    println!(
        "{} {identifiers} of {} tx(s) accepted, {errors} failed, {} sender(s)",
        bold("total:"),
        output.submitted,
        output.by_sender.len()
    );
    if output.by_sender.len() < requested_accounts {
        println!(
            "{}",
            Color::Yellow.paint(format!(
                "warning: only {} of {requested_accounts} requested account(s) were usable",
                output.by_sender.len()
            ))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amounts_with_units() {
        assert_eq!(parse_amount("100").unwrap(), U256::from(100));
        assert_eq!(parse_amount("5gwei").unwrap(), U256::from(5_000_000_000u64));
        assert_eq!(
            parse_amount("0.001 eth").unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_amount("1 ether").unwrap(),
            U256::from(10).pow(U256::from(18))
        );
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(parse_amount("lots").is_err());
        assert!(parse_amount("1 parsec").is_err());
    }
}
