mod docs;
mod editor;
mod history;
mod inventory;
mod login;
mod spectra;
mod visualize;

pub use docs::DocsView;
pub use editor::EditorView;
pub use history::HistoryView;
pub use inventory::InventoryView;
pub use login::LoginView;
pub use spectra::SpectraView;
pub use visualize::VisualizeView;
