//! Merges commands sharing a root into the payloads the gateway publishes.

use std::sync::Arc;

use super::command::{Command, CommandPayload, OptionData};

/// Builds one payload per root, in first-seen order. Subcommands are nested
/// under their group and deduplicated by name.
pub fn assemble(commands: &[Arc<Command>]) -> Vec<CommandPayload> {
    let mut payloads: Vec<CommandPayload> = Vec::new();

    for command in commands {
        let branch = command.branch();
        let index = match payloads
            .iter()
            .position(|payload| payload.kind == branch.root.kind && payload.name == branch.root.name)
        {
            Some(index) => index,
            None => {
                let mut root = branch.root.clone();
                if !branch.is_standalone() {
                    root.options.clear();
                }
                payloads.push(root);
                payloads.len() - 1
            }
        };

        let Some(subcommand) = &branch.subcommand else {
            continue;
        };
        let root = &mut payloads[index];
        let siblings = match &branch.group {
            Some(group) => {
                let position = match root.options.iter().position(|option| option.name == group.name) {
                    Some(position) => position,
                    None => {
                        let mut group = group.clone();
                        group.options.clear();
                        root.options.push(group);
                        root.options.len() - 1
                    }
                };
                &mut root.options[position].options
            }
            None => &mut root.options,
        };
        push_unique(siblings, subcommand);
    }

    payloads
}

fn push_unique(options: &mut Vec<OptionData>, option: &OptionData) {
    if !options.iter().any(|existing| existing.name == option.name) {
        options.push(option.clone());
    }
}
