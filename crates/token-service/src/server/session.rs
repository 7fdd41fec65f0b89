//! Cookie-addressed session handle used by the handshake handlers.
//!
//! Discipline: load once at handler entry, mutate in memory, save once
//! before responding. Nothing is written if the handler never calls
//! [`SessionHandle::save`].

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::transport::HttpState;
use crate::error::StoreResult;
use crate::session::{RequestContext, SessionRecord};

/// One request's view of its browser session.
#[derive(Debug)]
pub struct SessionHandle {
    id: String,
    record: SessionRecord,
    fresh: bool,
    ctx: RequestContext,
}

impl SessionHandle {
    /// Load the session named by the request cookie, or start an empty one.
    ///
    /// Unknown or expired ids get a new id rather than being adopted.
    pub async fn start(state: &HttpState, jar: &CookieJar) -> StoreResult<Self> {
        let ctx = RequestContext::new(state.config.store_timeout);

        if let Some(cookie) = jar.get(&state.config.session_cookie) {
            let id = cookie.value().to_owned();
            if let Some(record) = ctx.run(state.sessions.load(&ctx, &id)).await? {
                tracing::debug!(request_id = %ctx.request_id(), "Resumed session");
                return Ok(Self { id, record, fresh: false, ctx });
            }
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            record: SessionRecord::default(),
            fresh: true,
            ctx,
        })
    }

    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.ctx
    }

    #[must_use]
    pub const fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut SessionRecord {
        &mut self.record
    }

    /// Commit the record and attach the session cookie if it is new.
    pub async fn save(self, state: &HttpState, jar: CookieJar) -> StoreResult<CookieJar> {
        self.ctx.run(state.sessions.save(&self.ctx, &self.id, &self.record)).await?;

        if self.fresh {
            Ok(jar.add(session_cookie(&state.config.session_cookie, &self.id, state.config.secure_cookies)))
        } else {
            Ok(jar)
        }
    }
}

/// Create session cookie.
fn session_cookie(name: &str, session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_owned(), session_id.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("token_session", "abc", true);
        assert_eq!(cookie.name(), "token_session");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
