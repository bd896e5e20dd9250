use anyhow::{bail, Result};
use rami_node::{DrawSource, GameSummary};

pub const HELP: &[(&str, &str)] = &[
    ("draw", "inspect piles, then choose draw source or cancel"),
    ("piles", "show the current top cards without drawing"),
    ("discard <CARD>", "discard card (e.g., 7H, AD, JOKER)"),
    ("win <GROUPS>", "declare win (e.g., win 7H,7D,7S | AH,2H,3H | 10C,10D,JOKER)"),
    ("hand", "print your hand"),
    ("state", "show game state summary"),
    ("token", "show current token holder"),
    ("help", "show this list"),
    ("quit", "exit"),
];

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Draw,
    Piles,
    Discard(String),
    Win(Vec<Vec<String>>),
    Hand,
    State,
    Token,
    Help,
    Quit,
}

/// Parse a prompt line; blank lines give `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(None),
        "draw" => Command::Draw,
        "piles" => Command::Piles,
        "discard" => {
            let mut args = rest.split_whitespace();
            match (args.next(), args.next()) {
                (Some(card), None) => Command::Discard(card.to_string()),
                _ => bail!("Usage: discard <CARD>"),
            }
        }
        "win" => Command::Win(parse_groups(rest)?),
        "hand" => Command::Hand,
        "state" => Command::State,
        "token" => Command::Token,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("Unknown command '{}'. Type 'help' for the list.", other),
    };
    Ok(Some(command))
}

/// `7H,7D,7S | AH,2H,3H` into groups of card strings; empty groups are skipped
pub fn parse_groups(text: &str) -> Result<Vec<Vec<String>>> {
    let groups: Vec<Vec<String>> = text
        .split('|')
        .map(|group| {
            group
                .split(',')
                .map(str::trim)
                .filter(|card| !card.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect();
    if groups.is_empty() {
        bail!("Usage: win <GROUPS>\nExample: win 7H,7D,7S | AH,2H,3H | 10C,10D,JOKER");
    }
    Ok(groups)
}

/// Answer to the draw-source prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawChoice {
    Source(DrawSource),
    Cancel,
    /// Ask again, showing the message
    Retry(&'static str),
}

pub fn parse_draw_choice(answer: &str, piles: &GameSummary) -> DrawChoice {
    match answer.trim().to_lowercase().as_str() {
        "" | "c" | "cancel" => DrawChoice::Cancel,
        "deck" if piles.deck_size == 0 => DrawChoice::Retry("Draw pile is empty. Choose discard."),
        "deck" => DrawChoice::Source(DrawSource::Deck),
        "discard" if piles.discard_top.is_none() => {
            DrawChoice::Retry("Discard pile is empty. Choose deck.")
        }
        "discard" => DrawChoice::Source(DrawSource::Discard),
        _ => DrawChoice::Retry("Please enter 'deck', 'discard', or 'cancel'."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rami_node::game::Phase;
    use std::collections::BTreeMap;

    fn piles(deck_size: usize, discard_top: Option<&str>) -> GameSummary {
        GameSummary {
            current_player: "P1".to_string(),
            phase: Phase::AwaitDraw,
            deck_size,
            deck_top: None,
            discard_top: discard_top.map(|c| c.parse().unwrap()),
            hand_sizes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("draw").unwrap(), Some(Command::Draw));
        assert_eq!(parse("  hand ").unwrap(), Some(Command::Hand));
        assert_eq!(parse("token").unwrap(), Some(Command::Token));
        assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
        assert!(parse("dance").is_err());
    }

    #[test]
    fn test_discard_needs_one_card() {
        assert_eq!(
            parse("discard 7H").unwrap(),
            Some(Command::Discard("7H".to_string()))
        );
        assert!(parse("discard").is_err());
        assert!(parse("discard 7H 8H").is_err());
    }

    #[test]
    fn test_win_groups() {
        let parsed = parse("win 7H,7D,7S | AH, 2H ,3H | | 10C,10D,JOKER").unwrap();
        assert_eq!(
            parsed,
            Some(Command::Win(vec![
                vec!["7H".into(), "7D".into(), "7S".into()],
                vec!["AH".into(), "2H".into(), "3H".into()],
                vec!["10C".into(), "10D".into(), "JOKER".into()],
            ]))
        );
        assert!(parse("win").is_err());
        assert!(parse("win | ,").is_err());
    }

    #[test]
    fn test_draw_choice() {
        let both = piles(60, Some("5S"));
        assert_eq!(parse_draw_choice("deck", &both), DrawChoice::Source(DrawSource::Deck));
        assert_eq!(
            parse_draw_choice(" DISCARD ", &both),
            DrawChoice::Source(DrawSource::Discard)
        );
        assert_eq!(parse_draw_choice("", &both), DrawChoice::Cancel);
        assert_eq!(parse_draw_choice("c", &both), DrawChoice::Cancel);
        assert!(matches!(parse_draw_choice("pile", &both), DrawChoice::Retry(_)));

        let no_discard = piles(60, None);
        assert!(matches!(parse_draw_choice("discard", &no_discard), DrawChoice::Retry(_)));
        let no_deck = piles(0, Some("5S"));
        assert!(matches!(parse_draw_choice("deck", &no_deck), DrawChoice::Retry(_)));
    }
}
