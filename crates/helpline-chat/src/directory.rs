use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use helpline_db::StoreError;
use helpline_types::models::{AdminType, Room};

use crate::error::{ChatError, Result};
use crate::{ChatService, room_from_row};

impl ChatService {
    /// Resolve the single room for (user, admin_type), creating it on first
    /// contact. The admin is the first one registered for the type and stays
    /// bound to the room for its lifetime.
    ///
    /// Two first-contact requests may both pass the lookup before either
    /// inserts; the rooms table's UNIQUE(user_id, admin_type) constraint
    /// decides the winner, and the loser retries the lookup exactly once.
    pub fn resolve_or_create_room_for_user(
        &self,
        user: &str,
        admin_type: AdminType,
    ) -> Result<Room> {
        if let Some(row) = self.db().find_room_for_user(user, admin_type.as_str())? {
            return room_from_row(row);
        }

        let admin = self
            .db()
            .find_admin_by_type(admin_type.as_str())?
            .ok_or(ChatError::NoAdminAvailable(admin_type))?;

        let room = Room {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            admin_username: admin.username,
            admin_type,
            created_at: Utc::now(),
        };

        match self.db().insert_room(
            &room.id.to_string(),
            &room.user_id,
            &room.admin_username,
            admin_type.as_str(),
            &room.created_at.to_rfc3339(),
        ) {
            Ok(()) => {
                info!(
                    "Created room {} for {} / {} (admin {})",
                    room.id, room.user_id, admin_type, room.admin_username
                );
                Ok(room)
            }
            Err(StoreError::Duplicate) => {
                // Lost the creation race; the winner's room is authoritative.
                debug!("Room creation race for {} / {}, re-resolving", user, admin_type);
                let row = self
                    .db()
                    .find_room_for_user(user, admin_type.as_str())?
                    .ok_or(ChatError::Store(StoreError::Duplicate))?;
                room_from_row(row)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Admin-side lookup. Never creates: a missing room is `RoomNotFound`.
    pub fn resolve_room_for_admin(&self, admin_username: &str, user: &str) -> Result<Room> {
        let row = self
            .db()
            .find_room_for_admin(admin_username, user)?
            .ok_or(ChatError::RoomNotFound)?;
        room_from_row(row)
    }

    pub fn get_room(&self, room_id: Uuid) -> Result<Room> {
        let row = self
            .db()
            .get_room(&room_id.to_string())?
            .ok_or(ChatError::RoomNotFound)?;
        room_from_row(row)
    }

    /// Every room of an admin type, for the admin dashboard.
    pub fn list_rooms_by_admin_type(&self, admin_type: AdminType) -> Result<Vec<Room>> {
        self.db()
            .rooms_by_admin_type(admin_type.as_str())?
            .into_iter()
            .map(room_from_row)
            .collect()
    }

    /// The user's rooms across the fixed admin-type list, for the user
    /// dashboard. Types with no room are skipped — listing never creates.
    pub fn list_rooms_for_user(&self, user: &str) -> Result<Vec<Room>> {
        let mut rooms = Vec::new();
        for admin_type in AdminType::ALL {
            if let Some(row) = self.db().find_room_for_user(user, admin_type.as_str())? {
                rooms.push(room_from_row(row)?);
            }
        }
        Ok(rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{service, service_with_admin};
    use std::sync::Arc;

    #[test]
    fn resolve_or_create_is_idempotent() {
        let svc = service_with_admin("bob_admin", "Billing Support");

        let first = svc
            .resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap();
        let second = svc
            .resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.admin_username, "bob_admin");
    }

    #[test]
    fn no_admin_of_type_fails_creation() {
        let svc = service_with_admin("bob_admin", "Billing Support");

        let err = svc
            .resolve_or_create_room_for_user("alice", AdminType::Hr)
            .unwrap_err();
        assert!(matches!(err, ChatError::NoAdminAvailable(AdminType::Hr)));
    }

    #[test]
    fn concurrent_first_contact_yields_one_room() {
        let svc = Arc::new(service_with_admin("bob_admin", "Billing Support"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    svc.resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
                        .unwrap()
                        .id
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        let rooms = svc.list_rooms_for_user("alice").unwrap();
        assert_eq!(rooms.len(), 1);
    }

    #[test]
    fn admin_resolution_never_creates() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        svc.resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap();

        let room = svc.resolve_room_for_admin("bob_admin", "alice").unwrap();
        assert_eq!(room.admin_username, "bob_admin");

        // carol_admin shares no room with alice
        let err = svc.resolve_room_for_admin("carol_admin", "alice").unwrap_err();
        assert!(matches!(err, ChatError::RoomNotFound));
        assert_eq!(svc.list_rooms_for_user("alice").unwrap().len(), 1);
    }

    #[test]
    fn user_dashboard_listing_skips_absent_types() {
        let svc = service();
        svc.db()
            .create_admin("a1", "bob_admin", "hash", "Billing Support")
            .unwrap();
        svc.db()
            .create_admin("a2", "eve_admin", "hash", "HR")
            .unwrap();

        svc.resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap();
        svc.resolve_or_create_room_for_user("alice", AdminType::Hr)
            .unwrap();

        let rooms = svc.list_rooms_for_user("alice").unwrap();
        let types: Vec<_> = rooms.iter().map(|r| r.admin_type).collect();
        assert_eq!(types, vec![AdminType::BillingSupport, AdminType::Hr]);
    }

    #[test]
    fn rooms_listed_by_admin_type() {
        let svc = service_with_admin("bob_admin", "Billing Support");
        svc.resolve_or_create_room_for_user("alice", AdminType::BillingSupport)
            .unwrap();
        svc.resolve_or_create_room_for_user("dave", AdminType::BillingSupport)
            .unwrap();

        let rooms = svc.list_rooms_by_admin_type(AdminType::BillingSupport).unwrap();
        assert_eq!(rooms.len(), 2);
        assert!(svc
            .list_rooms_by_admin_type(AdminType::SalesRep)
            .unwrap()
            .is_empty());
    }
}
