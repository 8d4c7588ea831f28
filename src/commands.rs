/// Command palette entries and autocomplete ranking

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "inventory",
    aliases: &["i", "inv", "master"],
    description: "Master biochar inventory",
  },
  Command {
    name: "visualize",
    aliases: &["v", "viz", "charts"],
    description: "Charts for the selected samples",
  },
  Command {
    name: "edit",
    aliases: &["e", "editor"],
    description: "Edit rows and submit them",
  },
  Command {
    name: "history",
    aliases: &["h", "submissions"],
    description: "Submitted records",
  },
  Command {
    name: "spectra",
    aliases: &["s", "data"],
    description: "Instrument data files",
  },
  Command {
    name: "docs",
    aliases: &["d", "help", "naming"],
    description: "Data naming and instrument layouts",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Clear the session cache and refetch",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit acbc",
  },
];

/// Commands matching `input`, best match first.
///
/// Ranking: exact name, exact alias, name prefix, alias prefix, name
/// substring, alias substring.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let rank = |cmd: &Command| -> Option<u8> {
    let alias = |f: &dyn Fn(&str) -> bool| cmd.aliases.iter().any(|a| f(a));
    if cmd.name == input {
      Some(0)
    } else if alias(&|a| a == input) {
      Some(1)
    } else if cmd.name.starts_with(&input) {
      Some(2)
    } else if alias(&|a| a.starts_with(&input)) {
      Some(3)
    } else if cmd.name.contains(&input) {
      Some(4)
    } else if alias(&|a| a.contains(&input)) {
      Some(5)
    } else {
      None
    }
  };

  let mut matches: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
