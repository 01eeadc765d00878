//! Backend detection

use cq_core::{BackendKind, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::backend::{Scm, ScmContext};
use crate::git::GitScm;
use crate::svn::SvnScm;

/// Backends in the order they are probed; the first match wins
///
/// Subversion comes first so an svn checkout that also sits inside a git
/// work tree is driven with svn.
pub const PROBE_ORDER: [BackendKind; 2] = [BackendKind::Svn, BackendKind::Git];

/// Whether `path` is inside a checkout of `kind`; never fails
pub async fn in_working_directory(ctx: &ScmContext, kind: BackendKind, path: &Path) -> bool {
    match kind {
        BackendKind::Svn => SvnScm::in_working_directory(path),
        BackendKind::Git => GitScm::in_working_directory(&ctx.executive, path).await,
    }
}

/// Open a backend of `kind` for the checkout containing `path`
pub async fn open_backend(ctx: ScmContext, kind: BackendKind, path: &Path) -> Result<Box<dyn Scm>> {
    let backend: Box<dyn Scm> = match kind {
        BackendKind::Svn => Box::new(SvnScm::open(ctx, path).await?),
        BackendKind::Git => Box::new(GitScm::open(ctx, path).await?),
    };
    Ok(backend)
}

/// Detect which SCM drives `path` and open it
///
/// Returns `Ok(None)` when `path` is not in any supported checkout.
pub async fn detect_scm_system(ctx: &ScmContext, path: &Path) -> Result<Option<Box<dyn Scm>>> {
    for kind in PROBE_ORDER {
        if in_working_directory(ctx, kind, path).await {
            info!("Detected {} checkout at {}", kind, path.display());
            return open_backend(ctx.clone(), kind, path).await.map(Some);
        }
        debug!("{} does not claim {}", kind, path.display());
    }
    Ok(None)
}
