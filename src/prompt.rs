// src/prompt.rs
use anyhow::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};

use crate::uploads;

/// Ask for a directory until an existing one is given. Empty input picks `default`.
pub fn directory(label: &str, default: &Path) -> Result<PathBuf> {
    println!(
        "Default {} directory: {}",
        label,
        default.display().to_string().bright_cyan()
    );

    let default_owned = default.to_path_buf();
    let answer: String = Input::new()
        .with_prompt(format!("Please enter {} or leave empty for default", label))
        .allow_empty(true)
        .validate_with(move |input: &String| -> Result<(), String> {
            match resolve_dir(input, &default_owned) {
                Some(_) => Ok(()),
                None => Err("Directory does not exist, please try again".to_string()),
            }
        })
        .interact_text()?;

    resolve_dir(&answer, default)
        .ok_or_else(|| anyhow::anyhow!("Directory does not exist: {}", answer))
}

/// Ask for a directory with no default.
pub fn required_directory(prompt: &str) -> Result<PathBuf> {
    let answer: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), String> {
            match resolve_dir(input, Path::new("")) {
                Some(_) => Ok(()),
                None => Err("Directory doesn't exist, please try again".to_string()),
            }
        })
        .interact_text()?;

    resolve_dir(&answer, Path::new(""))
        .ok_or_else(|| anyhow::anyhow!("Directory does not exist: {}", answer))
}

pub fn recursion_depth() -> Result<Option<usize>> {
    let answer: String = Input::new()
        .with_prompt("Please specify a recursion depth (leave blank for infinite)")
        .allow_empty(true)
        .validate_with(|input: &String| parse_depth(input).map(|_| ()))
        .interact_text()?;

    parse_depth(&answer).map_err(anyhow::Error::msg)
}

pub fn date() -> Result<chrono::NaiveDate> {
    let answer: String = Input::new()
        .with_prompt("Please enter a timestamp (dd/mm/yy) to filter music by")
        .validate_with(|input: &String| -> Result<(), String> {
            uploads::parse_date(input)
                .map(|_| ())
                .map_err(|_| "Invalid date, expected dd/mm/yy".to_string())
        })
        .interact_text()?;

    uploads::parse_date(&answer)
}

pub fn verification_code() -> Result<String> {
    let code: String = Input::new()
        .with_prompt("Verification code")
        .interact_text()?;
    Ok(code.trim().to_string())
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Blank means unlimited; anything else must be a positive integer.
pub fn parse_depth(input: &str) -> Result<Option<usize>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    match input.parse::<usize>() {
        Ok(0) | Err(_) => Err("Invalid entry, please try again".to_string()),
        Ok(depth) => Ok(Some(depth)),
    }
}

/// Empty input selects `default`. Returns `None` unless the result is a directory.
pub fn resolve_dir(input: &str, default: &Path) -> Option<PathBuf> {
    let input = input.trim();
    let path = if input.is_empty() {
        default.to_path_buf()
    } else {
        PathBuf::from(shellexpand::tilde(input).as_ref())
    };

    if !path.as_os_str().is_empty() && path.is_dir() {
        Some(path)
    } else {
        None
    }
}
