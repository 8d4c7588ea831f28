mod command_input;
mod input;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use input::{InputResult, TextInput};
pub use search_input::{SearchEvent, SearchInput};

/// What a component did with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, with an event for the parent
  Event(T),
  /// Not consumed; the parent tries its next handler
  NotHandled,
}
