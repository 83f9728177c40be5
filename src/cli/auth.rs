//! Store or remove the Gemini API key in the system keyring.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::keyring::{delete_api_key, resolve_api_key, store_api_key, ApiKeySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationChoice {
    Yes,
    No,
}

pub fn parse_confirmation(input: &str) -> Result<ConfirmationChoice, String> {
    match input.trim().to_lowercase().as_str() {
        "" | "n" | "no" => Ok(ConfirmationChoice::No),
        "y" | "yes" => Ok(ConfirmationChoice::Yes),
        _ => Err("Invalid confirmation response".to_string()),
    }
}

fn prompt_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn run_auth() -> Result<(), Box<dyn Error>> {
    println!("🔐 Mande Authentication");
    println!("━━━━━━━━━━━━━━━━━━━━━━━");
    let key = prompt_line("Enter your Gemini API key: ")?;
    if key.is_empty() {
        return Err("API key cannot be empty".into());
    }
    store_api_key(&key)?;
    println!("✓ API key stored securely in the system keyring");

    if let Ok(Some((_, source @ ApiKeySource::Env(_)))) = resolve_api_key() {
        println!("⚠️  The {source} is set and takes precedence over the keyring");
    }
    Ok(())
}

pub fn run_deauth() -> Result<(), Box<dyn Error>> {
    let answer = prompt_line("Remove the stored Gemini API key? [y/N]: ")?;
    if parse_confirmation(&answer)? == ConfirmationChoice::No {
        println!("Cancelled.");
        return Ok(());
    }
    if delete_api_key()? {
        println!("✓ API key removed from the system keyring");
    } else {
        println!("No stored API key found.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_defaults_to_no() {
        assert_eq!(parse_confirmation(""), Ok(ConfirmationChoice::No));
        assert_eq!(parse_confirmation(" YES "), Ok(ConfirmationChoice::Yes));
        assert!(parse_confirmation("maybe").is_err());
    }
}
