//! Chat-borne command parsing and dispatch.

use std::collections::HashMap;

use crate::session::Client;

pub const COMMAND_PREFIX: char = '/';

pub type CommandHandler = Box<dyn FnMut(&mut CommandContext)>;

/// Passed to command callbacks: the issuing client, the argument list, and
/// a private reply channel back to that client.
pub struct CommandContext {
    pub client: Client,
    pub args: Vec<String>,
    replies: Vec<String>,
}

impl CommandContext {
    pub fn new(client: Client, args: Vec<String>) -> Self {
        Self {
            client,
            args,
            replies: Vec::new(),
        }
    }

    /// Queue a private message to the issuing client, delivered as a chat
    /// line from "Server" after the callback returns.
    pub fn reply(&mut self, message: impl Into<String>) {
        self.replies.push(message.into());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command \"{0}\" was already registered")]
    Duplicate(String),
}

struct RegisteredCommand {
    usage: Option<String>,
    required_args: Option<usize>,
    handler: CommandHandler,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No such command; the sender gets the fixed not-found reply.
    NotFound,
    /// Argument count mismatch; the sender gets this usage text privately
    /// and the callback is never invoked.
    Usage(String),
    /// The callback ran; these are its private replies to the sender.
    Replies(Vec<String>),
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Register a command. Duplicate names are a configuration error and
    /// must abort startup.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        usage: Option<String>,
        required_args: Option<usize>,
        handler: CommandHandler,
    ) -> Result<(), CommandError> {
        let name = name.into();
        if self.commands.contains_key(&name) {
            return Err(CommandError::Duplicate(name));
        }

        self.commands.insert(
            name,
            RegisteredCommand {
                usage,
                required_args,
                handler,
            },
        );
        Ok(())
    }

    /// Dispatch a chat message. `None` means the message does not start
    /// with the command prefix and should go down the chat path instead.
    pub fn dispatch(&mut self, message: &str, client: Client) -> Option<CommandOutcome> {
        let stripped = message.strip_prefix(COMMAND_PREFIX)?;

        let mut tokens = stripped.split_whitespace();
        let name = tokens.next().unwrap_or("");
        let args: Vec<String> = tokens.map(str::to_string).collect();

        let Some(command) = self.commands.get_mut(name) else {
            return Some(CommandOutcome::NotFound);
        };

        if let Some(required) = command.required_args
            && required != args.len()
        {
            let usage = command
                .usage
                .clone()
                .unwrap_or_else(|| format!("Usage: {COMMAND_PREFIX}{name}"));
            return Some(CommandOutcome::Usage(usage));
        }

        let mut ctx = CommandContext::new(client, args);
        (command.handler)(&mut ctx);
        Some(CommandOutcome::Replies(ctx.replies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn client() -> Client {
        Client::new(1, "club".into(), "alpha".into())
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = CommandRegistry::new();
        registry
            .register("tp", None, None, Box::new(|_| {}))
            .unwrap();

        let err = registry
            .register("tp", None, None, Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, CommandError::Duplicate(name) if name == "tp"));
    }

    #[test]
    fn non_commands_are_left_to_the_chat_path() {
        let mut registry = CommandRegistry::new();
        assert!(registry.dispatch("hello there", client()).is_none());
    }

    #[test]
    fn unknown_commands_get_the_not_found_outcome() {
        let mut registry = CommandRegistry::new();
        assert_eq!(
            registry.dispatch("/nope", client()),
            Some(CommandOutcome::NotFound)
        );
    }

    #[test]
    fn wrong_arg_count_replies_with_usage_and_skips_the_callback() {
        let invoked = Rc::new(Cell::new(false));
        let flag = Rc::clone(&invoked);

        let mut registry = CommandRegistry::new();
        registry
            .register(
                "tp",
                Some("Usage: /tp <x> <y> <z>".to_string()),
                Some(3),
                Box::new(move |_| flag.set(true)),
            )
            .unwrap();

        let outcome = registry.dispatch("/tp 1 2", client()).unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Usage("Usage: /tp <x> <y> <z>".to_string())
        );
        assert!(!invoked.get());
    }

    #[test]
    fn matching_arg_count_invokes_the_callback() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                "tp",
                Some("Usage: /tp <x> <y> <z>".to_string()),
                Some(3),
                Box::new(|ctx| {
                    let args = ctx.args.join(",");
                    ctx.reply(format!("teleporting to {args}"));
                }),
            )
            .unwrap();

        let outcome = registry.dispatch("/tp 1 2 3", client()).unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Replies(vec!["teleporting to 1,2,3".to_string()])
        );
    }

    #[test]
    fn commands_without_a_declared_count_take_any_args() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                "me",
                None,
                None,
                Box::new(|ctx| ctx.reply(format!("{} args", ctx.args.len()))),
            )
            .unwrap();

        assert_eq!(
            registry.dispatch("/me waves at everyone", client()).unwrap(),
            CommandOutcome::Replies(vec!["3 args".to_string()])
        );
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let mut registry = CommandRegistry::new();
        registry
            .register("kick", None, None, Box::new(|_| {}))
            .unwrap();

        assert_eq!(
            registry.dispatch("/Kick", client()),
            Some(CommandOutcome::NotFound)
        );
    }
}
