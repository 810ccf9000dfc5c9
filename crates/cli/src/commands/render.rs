use std::io::{self, Read};

use relaybot_core::to_mrkdwn;

use super::CommandResult;

pub fn run(text: Option<String>) -> CommandResult {
    run_with_input(text, io::stdin().lock())
}

/// Renders `text`, or everything readable from `input` when no text is given.
pub fn run_with_input(text: Option<String>, mut input: impl Read) -> CommandResult {
    let markdown = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            if let Err(error) = input.read_to_string(&mut buffer) {
                return CommandResult::failure(
                    "render",
                    "input",
                    format!("could not read markdown from stdin: {error}"),
                    1,
                );
            }
            buffer
        }
    };

    CommandResult::plain(0, to_mrkdwn(&markdown))
}
