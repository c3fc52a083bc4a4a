use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use helpline_types::models::{ChatMessage, RoomSummary};

use crate::error::Result;
use crate::{ChatService, parse_timestamp};

impl ChatService {
    /// Encrypt and persist a message. Fan-out is the caller's concern —
    /// keeping persistence and delivery independent keeps both testable and
    /// independently failable.
    pub fn append_message(&self, room_id: Uuid, text: &str, sender: &str) -> Result<ChatMessage> {
        let (ciphertext, nonce) = self.codec().encrypt(text)?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            room_id,
            sender: sender.to_string(),
            message: text.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        self.db().insert_message(
            &message.id.to_string(),
            &room_id.to_string(),
            sender,
            &ciphertext,
            &nonce,
            &message.created_at.to_rfc3339(),
        )?;

        debug!("{} appended message {} to room {}", sender, message.id, room_id);
        Ok(message)
    }

    /// A page of decrypted history, oldest-first for display. Offset is
    /// `page * limit` over the newest-first order, so page 0 holds the most
    /// recent messages. A single decrypt failure fails the whole page.
    pub fn fetch_page(&self, room_id: Uuid, limit: u32, page: u32) -> Result<Vec<ChatMessage>> {
        let rows = self
            .db()
            .messages_page(&room_id.to_string(), limit, page.saturating_mul(limit))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let text = self.codec().decrypt(&row.ciphertext, &row.nonce)?;
            messages.push(ChatMessage {
                id: row
                    .id
                    .parse()
                    .map_err(|_| crate::ChatError::Corrupt(format!("message id '{}'", row.id)))?,
                room_id,
                sender: row.sender,
                message: text,
                read: row.is_read,
                created_at: parse_timestamp(&row.created_at)?,
            });
        }

        messages.reverse();
        Ok(messages)
    }

    /// Flip every unread message not sent by `requester` to read. Returns
    /// the number of messages changed; re-running is a no-op.
    pub fn mark_read(&self, room_id: Uuid, requester: &str) -> Result<u64> {
        let count = self
            .db()
            .mark_messages_read(&room_id.to_string(), requester)?;
        if count > 0 {
            debug!("{} marked {} messages read in room {}", requester, count, room_id);
        }
        Ok(count)
    }

    /// Unread count + decrypted last-message preview from the requester's
    /// perspective. Two indexed lookups; never scans the room.
    pub fn summarize(&self, room_id: Uuid, requester: &str) -> Result<RoomSummary> {
        let room_key = room_id.to_string();
        let unread_count = self.db().count_unread(&room_key, requester)?;

        let Some(last) = self.db().last_message(&room_key)? else {
            return Ok(RoomSummary {
                unread_count,
                last_message: None,
                last_sender: None,
                last_message_read: true,
                last_time: None,
            });
        };

        Ok(RoomSummary {
            unread_count,
            last_message: Some(self.codec().decrypt(&last.ciphertext, &last.nonce)?),
            last_sender: Some(last.sender),
            last_message_read: last.is_read,
            last_time: Some(parse_timestamp(&last.created_at)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatError;
    use crate::testutil::service_with_admin;
    use helpline_types::models::AdminType;

    fn room(svc: &ChatService) -> Uuid {
        svc.resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap()
            .id
    }

    #[test]
    fn append_then_fetch_decrypts() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        svc.append_message(room_id, "hi there", "alice").unwrap();
        let page = svc.fetch_page(room_id, 20, 0).unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].message, "hi there");
        assert_eq!(page[0].sender, "alice");
        assert!(!page[0].read);

        // Ciphertext at rest differs from the plaintext
        let raw = svc.db().last_message(&room_id.to_string()).unwrap().unwrap();
        assert_ne!(raw.ciphertext, b"hi there");
    }

    #[test]
    fn pagination_is_oldest_first_within_newest_pages() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        for i in 1..=5 {
            svc.append_message(room_id, &format!("msg {i}"), "alice")
                .unwrap();
        }

        let page0 = svc.fetch_page(room_id, 3, 0).unwrap();
        let texts: Vec<&str> = page0.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["msg 3", "msg 4", "msg 5"]);

        let page1 = svc.fetch_page(room_id, 3, 1).unwrap();
        let texts: Vec<&str> = page1.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["msg 1", "msg 2"]);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        svc.append_message(room_id, "hello?", "alice").unwrap();
        svc.append_message(room_id, "anyone?", "alice").unwrap();

        assert_eq!(svc.mark_read(room_id, "bob_admin").unwrap(), 2);
        assert_eq!(svc.mark_read(room_id, "bob_admin").unwrap(), 0);

        let page = svc.fetch_page(room_id, 20, 0).unwrap();
        assert!(page.iter().all(|m| m.read));
    }

    #[test]
    fn summary_excludes_own_messages_from_unread() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        svc.append_message(room_id, "hi", "alice").unwrap();

        let for_bob = svc.summarize(room_id, "bob_admin").unwrap();
        assert_eq!(for_bob.unread_count, 1);
        assert_eq!(for_bob.last_message.as_deref(), Some("hi"));
        assert_eq!(for_bob.last_sender.as_deref(), Some("alice"));
        assert!(!for_bob.last_message_read);
        assert!(for_bob.last_time.is_some());

        let for_alice = svc.summarize(room_id, "alice").unwrap();
        assert_eq!(for_alice.unread_count, 0);
        assert_eq!(for_alice.last_message.as_deref(), Some("hi"));
    }

    #[test]
    fn empty_room_summary_defaults() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        let summary = svc.summarize(room_id, "alice").unwrap();
        assert_eq!(summary.unread_count, 0);
        assert!(summary.last_message.is_none());
        assert!(summary.last_message_read);
        assert!(summary.last_time.is_none());
    }

    #[test]
    fn corrupt_ciphertext_fails_the_whole_page() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        let room_id = room(&svc);

        svc.append_message(room_id, "fine", "alice").unwrap();
        // A row that was never produced by this codec
        svc.db()
            .insert_message(
                &Uuid::new_v4().to_string(),
                &room_id.to_string(),
                "alice",
                b"garbage",
                b"twelve_bytes",
                &Utc::now().to_rfc3339(),
            )
            .unwrap();

        let err = svc.fetch_page(room_id, 20, 0).unwrap_err();
        assert!(matches!(err, ChatError::Codec(_)));
    }
}
