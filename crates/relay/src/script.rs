//! Optional server extension contract.
//!
//! A single extension may observe or veto server events. Implementations
//! are compiled in and chosen by name from a [`ScriptCatalog`]; a missing
//! or unknown name degrades to "no extension installed". Callbacks run
//! synchronously on the dispatch thread and must not block.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::command::{CommandContext, CommandError, CommandRegistry};
use crate::net::ModData;
use crate::session::Client;

/// One row of an extension's declared command table.
#[derive(Debug, Clone)]
pub struct CommandDef {
    pub name: &'static str,
    pub usage: Option<&'static str>,
    pub required_args: Option<usize>,
}

pub trait ServerScript {
    /// Commands to register at startup. Invocations come back through
    /// [`ServerScript::on_command`].
    fn commands(&self) -> Vec<CommandDef> {
        Vec::new()
    }

    fn on_command(&mut self, _name: &str, _ctx: &mut CommandContext) {}

    /// A connection passed validation and was admitted to the registry.
    fn on_player_handshake(&mut self, _client: &Client) {}

    fn on_player_connected(&mut self, _client: &Client) {}

    fn on_player_disconnected(&mut self, _client: &Client) {}

    fn on_player_update(&mut self, _client: &Client) {}

    /// Return `true` to suppress the chat broadcast entirely.
    fn on_chat_message(&mut self, _username: &str, _message: &str) -> bool {
        false
    }

    /// Return `true` to cancel relaying the mod packet.
    fn on_mod_packet(&mut self, _packet: &ModData) -> bool {
        false
    }
}

pub type ScriptConstructor = fn() -> Box<dyn ServerScript>;

/// Compiled-in table of loadable extensions, keyed by name.
#[derive(Default)]
pub struct ScriptCatalog {
    entries: HashMap<String, ScriptConstructor>,
}

impl ScriptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: ScriptConstructor) {
        self.entries.insert(name.into(), constructor);
    }

    pub fn instantiate(&self, name: &str) -> Option<Box<dyn ServerScript>> {
        self.entries.get(name).map(|constructor| constructor())
    }
}

type SharedScript = Rc<RefCell<Box<dyn ServerScript>>>;

/// Holds the loaded extension, if any, and shields the dispatch loop from
/// it: every callback runs under `catch_unwind`, so a panicking extension
/// is logged and ignored rather than taking the server down.
#[derive(Clone, Default)]
pub struct ScriptHost {
    script: Option<SharedScript>,
}

impl ScriptHost {
    /// No extension installed; every hook is a no-op.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_script(script: Box<dyn ServerScript>) -> Self {
        Self {
            script: Some(Rc::new(RefCell::new(script))),
        }
    }

    /// Look `name` up in the catalog, degrading to no extension when it is
    /// missing.
    pub fn load(catalog: &ScriptCatalog, name: &str) -> Self {
        match catalog.instantiate(name) {
            Some(script) => {
                log::info!("loaded extension \"{name}\"");
                Self::with_script(script)
            }
            None => {
                log::warn!("extension \"{name}\" not found, continuing without one");
                Self::none()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.script.is_some()
    }

    /// Register the extension's declared command table. Duplicates are a
    /// startup-time error.
    pub fn install_commands(&self, registry: &mut CommandRegistry) -> Result<(), CommandError> {
        let Some(script) = &self.script else {
            return Ok(());
        };

        let defs = script.borrow().commands();
        for def in defs {
            let slot = Rc::clone(script);
            let name = def.name.to_string();
            registry.register(
                def.name,
                def.usage.map(str::to_string),
                def.required_args,
                Box::new(move |ctx| {
                    slot.borrow_mut().on_command(&name, ctx);
                }),
            )?;
        }
        Ok(())
    }

    fn guard<R>(&self, default: R, f: impl FnOnce(&mut dyn ServerScript) -> R) -> R {
        let Some(script) = &self.script else {
            return default;
        };
        let mut script = script.borrow_mut();

        match catch_unwind(AssertUnwindSafe(|| f(script.as_mut()))) {
            Ok(result) => result,
            Err(_) => {
                log::error!("extension callback panicked; event ignored");
                default
            }
        }
    }

    pub fn player_handshake(&self, client: &Client) {
        self.guard((), |script| script.on_player_handshake(client));
    }

    pub fn player_connected(&self, client: &Client) {
        self.guard((), |script| script.on_player_connected(client));
    }

    pub fn player_disconnected(&self, client: &Client) {
        self.guard((), |script| script.on_player_disconnected(client));
    }

    pub fn player_update(&self, client: &Client) {
        self.guard((), |script| script.on_player_update(client));
    }

    /// True when the extension vetoed the message.
    pub fn chat_message(&self, username: &str, message: &str) -> bool {
        self.guard(false, |script| script.on_chat_message(username, message))
    }

    /// True when the extension canceled the relay.
    pub fn mod_packet(&self, packet: &ModData) -> bool {
        self.guard(false, |script| script.on_mod_packet(packet))
    }
}
