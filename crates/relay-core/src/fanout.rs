//! Notification fan-out: replicate forwards and status notices to every operator.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    directory::RelayDirectory,
    domain::{MessageLink, MessageRef, UserId},
    errors::Error,
    formatting::{display_name, escape_html, handle},
    messaging::{
        port::RelayPort,
        types::{InboundMessage, Sender},
    },
};

pub const PREVIOUSLY_ANSWERED: &str = "↩️ Previously answered";
pub const REPLY_DELIVERED: &str = "✅ Reply delivered";
pub const REPLY_FAILED: &str = "❌ Failed to deliver reply";

pub struct Fanout {
    port: Arc<dyn RelayPort>,
    directory: Arc<RelayDirectory>,
    operators: Vec<UserId>,
}

impl Fanout {
    pub fn new(
        port: Arc<dyn RelayPort>,
        directory: Arc<RelayDirectory>,
        operators: Vec<UserId>,
    ) -> Self {
        Self {
            port,
            directory,
            operators,
        }
    }

    pub fn is_operator(&self, user: UserId) -> bool {
        self.operators.contains(&user)
    }

    /// Forward `msg` to every operator, one attempt each.
    ///
    /// Returns the links created for the operators that were reached. Each
    /// reached operator also gets an info notice threaded to their copy.
    pub async fn forward(&self, msg: &InboundMessage, sender: &Sender) -> Vec<MessageLink> {
        let source = msg.message_ref();
        let previously_answered = match msg.reply_target() {
            Some(id) => self.directory.was_replied(id).await,
            None => false,
        };
        let notice = info_notice(sender, &source, previously_answered);

        let mut links = Vec::with_capacity(self.operators.len());
        for &operator in &self.operators {
            let forwarded = match self
                .port
                .forward_message(operator.private_chat(), source)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        operator = operator.0,
                        chat_id = source.chat_id.0,
                        message_id = source.message_id.0,
                        error = %e,
                        "forward to operator failed"
                    );
                    continue;
                }
            };

            let link = MessageLink {
                forwarded_id: forwarded.message_id,
                origin_chat: source.chat_id,
                origin_message_id: source.message_id,
                operator_id: Some(operator),
            };
            match self
                .directory
                .record_link(
                    link.forwarded_id,
                    link.origin_chat,
                    link.origin_message_id,
                    operator,
                )
                .await
            {
                // Persistence failures are already logged; the link is live in memory.
                Ok(()) | Err(Error::Persistence(_)) => links.push(link),
                Err(e) => warn!(operator = operator.0, error = %e, "link not recorded"),
            }

            if let Err(e) = self
                .port
                .send_html(forwarded.chat_id, &notice, Some(forwarded.message_id))
                .await
            {
                warn!(operator = operator.0, error = %e, "info notice failed");
            }
        }

        info!(
            chat_id = source.chat_id.0,
            message_id = source.message_id.0,
            reached = links.len(),
            operators = self.operators.len(),
            "user message forwarded"
        );
        links
    }

    /// Tell the replying operator the reply went out, and every other
    /// operator that the thread has been handled.
    pub async fn acknowledge(&self, replier: &Sender, reply: MessageRef, link: &MessageLink) {
        if let Err(e) = self
            .port
            .send_html(reply.chat_id, REPLY_DELIVERED, Some(reply.message_id))
            .await
        {
            warn!(operator = replier.id.0, error = %e, "reply acknowledgment failed");
        }

        let others: Vec<UserId> = self
            .operators
            .iter()
            .copied()
            .filter(|op| *op != replier.id)
            .collect();
        if others.is_empty() {
            return;
        }

        let copies = self
            .directory
            .links_for_origin(link.origin_chat, link.origin_message_id)
            .await;
        let note = format!(
            "✅ <b>{}</b> replied to chat <code>{}</code>",
            escape_html(&display_name(replier)),
            link.origin_chat.0
        );
        for op in others {
            let thread = copies
                .iter()
                .find(|c| c.operator_id == Some(op))
                .map(|c| c.forwarded_id);
            if let Err(e) = self.port.send_html(op.private_chat(), &note, thread).await {
                warn!(operator = op.0, error = %e, "handled notice failed");
            }
        }
    }

    /// Failure notice to the replying operator only.
    pub async fn report_failure(&self, reply: MessageRef, err: &Error) {
        let text = format!(
            "{REPLY_FAILED}\n<code>{}</code>",
            escape_html(&err.to_string())
        );
        if let Err(e) = self
            .port
            .send_html(reply.chat_id, &text, Some(reply.message_id))
            .await
        {
            warn!(chat_id = reply.chat_id.0, error = %e, "failure notice failed");
        }
    }
}

fn info_notice(sender: &Sender, source: &MessageRef, previously_answered: bool) -> String {
    let mut out = String::new();
    if previously_answered {
        out.push_str(PREVIOUSLY_ANSWERED);
        out.push('\n');
    }
    out.push_str(&format!(
        "👤 <b>{}</b> ({})\n💬 Chat <code>{}</code>",
        escape_html(&display_name(sender)),
        escape_html(&handle(sender)),
        source.chat_id.0
    ));
    out
}
