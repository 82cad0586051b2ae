//! # Feature: Command System
//!
//! Explicit, builder-based command registration and dispatch. Cogs describe
//! handlers, the parser turns them into immutable commands, and the manager
//! publishes and dispatches them.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Slash, subcommand and context-menu commands with typed parameters

pub mod autocomplete;
pub mod builder;
pub mod command;
pub mod manager;
pub mod parser;
pub mod payload;
pub mod table;

pub use autocomplete::{AutoCompleter, LocaleCompleter, StaticCompleter, MAX_CHOICES};
pub use builder::{Cog, ContextKind, HandlerSpec, OptionKind, OptionRange, ParamSpec, SlashRoot};
pub use command::{
    handler, Arguments, Branch, Choice, ChoiceValue, Command, CommandHandle, CommandPayload, OptionData,
    ParameterBinding, Reply, Response,
};
pub use manager::{CommandManager, DispatchOutcome};
pub use parser::CommandParser;
pub use table::CommandTable;
