mod product_list;
mod wishlist_detail;
mod wishlist_list;

pub use product_list::ProductListView;
pub use wishlist_detail::WishlistDetailView;
pub use wishlist_list::WishlistListView;

use crate::routes::Route;
use crate::ui::view::View;
use crate::wishlist::WishlistClient;

/// Root view for a route
pub fn for_route(route: &Route, client: WishlistClient) -> Box<dyn View> {
  match route {
    Route::Home => Box::new(WishlistListView::new(client)),
    Route::Products => Box::new(ProductListView::new(client)),
    Route::Wishlist { id } => Box::new(WishlistDetailView::new(id.clone(), client)),
  }
}
