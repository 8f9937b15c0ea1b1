//! Notification and conversation readers.
//!
//! Both operations follow the same two-step shape: fetch a fixed SDO page
//! to harvest a fresh `sesskey` and the signed-in user's id, then make one
//! gateway call with those tokens. Payload items are returned as raw JSON
//! values; their schema belongs to the backend and changes with it.

use serde::Serialize;
use serde_json::Value;

use crate::auth::{self, Authenticator};
use crate::endpoints::{Endpoints, MESSAGES_PAGE_PATH, NOTIFICATIONS_PAGE_PATH};
use crate::error::Result;
use crate::rpc::AjaxGateway;
use crate::session::Session;

const NOTIFICATIONS_METHOD: &str = "message_popup_get_popup_notifications";
const CONVERSATIONS_METHOD: &str = "core_message_get_conversations";

/// How many notifications a single read asks for.
const NOTIFICATION_LIMIT: u32 = 1000;
/// Conversation page size; one more than the UI shows per screen.
const CONVERSATION_PAGE_SIZE: u32 = 51;

#[derive(Debug, Serialize)]
struct NotificationArgs {
    limit: u32,
    offset: u32,
    useridto: u64,
}

#[derive(Debug, Serialize)]
struct ConversationArgs {
    favourites: bool,
    limitfrom: u32,
    limitnum: u32,
    /// Conversation-type filter. `None` serializes to the explicit `null`
    /// the backend reads as "no filter"; omitting the key changes behavior.
    #[serde(rename = "type")]
    conversation_type: Option<u32>,
    userid: u64,
}

/// Reader for popup notifications and message conversations.
#[derive(Debug, Clone)]
pub struct Messaging {
    session: Session,
    gateway: AjaxGateway,
    endpoints: Endpoints,
}

impl Messaging {
    pub fn new(auth: &Authenticator) -> Self {
        Self {
            session: auth.session().clone(),
            gateway: AjaxGateway::new(auth),
            endpoints: auth.endpoints().clone(),
        }
    }

    /// Fetch the newest popup notifications addressed to the signed-in
    /// user, most recent first.
    pub async fn notifications(&self) -> Result<Vec<Value>> {
        let page = self
            .session
            .get(&self.endpoints.sdo_page(NOTIFICATIONS_PAGE_PATH))
            .await?;
        let sesskey = auth::extract_sesskey(&page.body)?;
        let user_id = auth::extract_context_id(&page.body)?;
        let args = NotificationArgs {
            limit: NOTIFICATION_LIMIT,
            offset: 0,
            useridto: user_id,
        };
        let envelope = self.gateway.call(&sesskey, NOTIFICATIONS_METHOD, args).await?;
        Ok(into_list(envelope))
    }

    /// Fetch the first page of the signed-in user's conversations,
    /// unfiltered by type.
    pub async fn conversations(&self) -> Result<Vec<Value>> {
        let page = self
            .session
            .get(&self.endpoints.sdo_page(MESSAGES_PAGE_PATH))
            .await?;
        let sesskey = auth::extract_sesskey(&page.body)?;
        let user_id = auth::extract_context_id(&page.body)?;
        let args = ConversationArgs {
            favourites: false,
            limitfrom: 0,
            limitnum: CONVERSATION_PAGE_SIZE,
            conversation_type: None,
            userid: user_id,
        };
        let envelope = self.gateway.call(&sesskey, CONVERSATIONS_METHOD, args).await?;
        Ok(into_list(envelope))
    }
}

/// The service answers batch calls with a list envelope; wrap the
/// occasional bare-object reply so callers always see a list.
fn into_list(envelope: Value) -> Vec<Value> {
    match envelope {
        Value::Array(items) => items,
        other => vec![other],
    }
}
