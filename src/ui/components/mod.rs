mod command_input;
mod confirm;
mod input;
mod key_result;
mod notification;
mod product_form;
mod wishlist_form;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::{ConfirmEvent, ConfirmPrompt};
pub use key_result::KeyResult;
pub use notification::Notification;
pub use product_form::ProductFormPopup;
pub use wishlist_form::{FormEvent, WishlistFormPopup};
