use query_core::{Page, PageRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{RepoError, Result};
use crate::store::{QuerySpec, Queryable, Window};

/// Run `query` and cut out the requested page.
///
/// Total count and items come from one [`Queryable::count_and_window`] call,
/// so both describe the same state when the backend supports it.
pub async fn paginate<E, Q>(
    source: &Q,
    query: &QuerySpec,
    page: PageRequest,
    cancel: &CancellationToken,
) -> Result<Page<E>>
where
    E: Entity,
    Q: Queryable<E> + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(RepoError::Cancelled);
    }
    let window = Window {
        offset: page.offset(),
        limit: u64::from(page.size()),
    };
    let (total, mut items) = source.count_and_window(query, window).await?;
    items.truncate(page.size() as usize);

    debug!(
        entity = E::NAME,
        index = page.index(),
        size = page.size(),
        total,
        returned = items.len(),
        "page fetched"
    );
    Ok(Page::new(items, page, total))
}
