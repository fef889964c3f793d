//! Capability evaluation.
//!
//! Pure functions of explicit snapshots: `(identity, current membership,
//! target entity)`. Lifecycle clients call these before issuing a mutating
//! request, and recompute them from the next authoritative fetch; results
//! are never cached across a transition.

use crate::api::loans::{LoanItem, LoanItemStatus};
use crate::api::requests::{HelpRequest, HelpRequestStatus};

use super::{CommunityRole, Identity, Membership};

/// Moderator of the current community, or superadmin anywhere.
pub fn can_manage_community(identity: &Identity, membership: Option<&Membership>) -> bool {
    identity.is_superadmin
        || membership.is_some_and(|m| {
            matches!(
                m.role_in_community,
                CommunityRole::Moderator | CommunityRole::Superadmin
            )
        })
}

/// Volunteer on a request: only while open, never on your own.
pub fn can_offer_on_request(identity: &Identity, request: &HelpRequest) -> bool {
    request.status == HelpRequestStatus::Open && request.created_by_user_id != identity.id
}

/// Accept an offer: only the creator, only while the request is open.
pub fn can_accept_offer(identity: &Identity, request: &HelpRequest) -> bool {
    request.status == HelpRequestStatus::Open && request.created_by_user_id == identity.id
}

/// Close (resolve or cancel): only the creator, from open or in_progress.
pub fn can_close_request(identity: &Identity, request: &HelpRequest) -> bool {
    request.created_by_user_id == identity.id
        && matches!(
            request.status,
            HelpRequestStatus::Open | HelpRequestStatus::InProgress
        )
}

/// Moderation actions against a request: community-scoped for moderators,
/// unscoped for superadmins.
pub fn can_moderate_request(
    identity: &Identity,
    membership: Option<&Membership>,
    request: &HelpRequest,
) -> bool {
    if identity.is_superadmin {
        return true;
    }
    membership.is_some_and(|m| {
        m.community_id == request.community_id
            && matches!(
                m.role_in_community,
                CommunityRole::Moderator | CommunityRole::Superadmin
            )
    })
}

/// Ask to borrow: only while available, never your own item.
pub fn can_request_loan(identity: &Identity, item: &LoanItem) -> bool {
    item.status == LoanItemStatus::Available && item.owner_user_id != identity.id
}

/// Edit the item, accept or reject its loan requests: owner only.
pub fn can_manage_loan_item(identity: &Identity, item: &LoanItem) -> bool {
    item.owner_user_id == identity.id
}

/// Mark returned: owner only, and only while loaned.
pub fn can_mark_returned(identity: &Identity, item: &LoanItem) -> bool {
    can_manage_loan_item(identity, item) && item.status == LoanItemStatus::Loaned
}

/// Report triage shares the community-management grant.
pub fn can_manage_reports(identity: &Identity, membership: Option<&Membership>) -> bool {
    can_manage_community(identity, membership)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::loans::LoanItem;
    use crate::api::requests::HelpRequest;
    use crate::identity::MembershipStatus;
    use chrono::Utc;

    fn user(id: i64, superadmin: bool) -> Identity {
        Identity {
            id,
            email: format!("user{id}@example.com"),
            display_name: format!("User {id}"),
            is_superadmin: superadmin,
            communities: Vec::new(),
        }
    }

    fn membership(community_id: i64, role: CommunityRole) -> Membership {
        Membership {
            community_id,
            community_name: "Obanos".to_string(),
            status: MembershipStatus::Approved,
            role_in_community: role,
        }
    }

    fn request(creator: i64, community: i64, status: HelpRequestStatus) -> HelpRequest {
        HelpRequest {
            id: 1,
            community_id: community,
            created_by_user_id: creator,
            created_by_display_name: "Creator".to_string(),
            title: "Move a couch".to_string(),
            description: String::new(),
            category: "transport".to_string(),
            time_window_text: String::new(),
            location_area_text: String::new(),
            location_radius_km: None,
            status,
            accepted_offer_id: None,
            offers_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        }
    }

    fn item(owner: i64, status: LoanItemStatus) -> LoanItem {
        LoanItem {
            id: 1,
            community_id: 1,
            owner_user_id: owner,
            owner_display_name: "Owner".to_string(),
            title: "Drill".to_string(),
            description: String::new(),
            status,
            borrower_user_id: None,
            borrower_display_name: None,
            loaned_at: None,
            returned_at: None,
            pending_requests_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn offering_needs_open_status_and_other_creator() {
        let me = user(10, false);
        assert!(can_offer_on_request(&me, &request(20, 1, HelpRequestStatus::Open)));
        // own request
        assert!(!can_offer_on_request(&me, &request(10, 1, HelpRequestStatus::Open)));
        // not open any more
        assert!(!can_offer_on_request(&me, &request(20, 1, HelpRequestStatus::InProgress)));
        assert!(!can_offer_on_request(&me, &request(20, 1, HelpRequestStatus::Cancelled)));
    }

    #[test]
    fn accepting_is_creator_only_while_open() {
        let creator = user(10, false);
        let stranger = user(11, false);
        let open = request(10, 1, HelpRequestStatus::Open);
        assert!(can_accept_offer(&creator, &open));
        assert!(!can_accept_offer(&stranger, &open));
        assert!(!can_accept_offer(&creator, &request(10, 1, HelpRequestStatus::InProgress)));
    }

    #[test]
    fn closing_stops_at_terminal_states() {
        let creator = user(10, false);
        assert!(can_close_request(&creator, &request(10, 1, HelpRequestStatus::Open)));
        assert!(can_close_request(&creator, &request(10, 1, HelpRequestStatus::InProgress)));
        assert!(!can_close_request(&creator, &request(10, 1, HelpRequestStatus::Resolved)));
        assert!(!can_close_request(&creator, &request(10, 1, HelpRequestStatus::Cancelled)));
        // non-creator, non-moderator cannot close at all
        assert!(!can_close_request(&user(11, false), &request(10, 1, HelpRequestStatus::Open)));
    }

    #[test]
    fn moderation_is_scoped_to_the_membership_community() {
        let moderator = user(10, false);
        let m = membership(1, CommunityRole::Moderator);
        assert!(can_moderate_request(&moderator, Some(&m), &request(20, 1, HelpRequestStatus::Open)));
        // other community
        assert!(!can_moderate_request(&moderator, Some(&m), &request(20, 2, HelpRequestStatus::Open)));
        // plain member
        let m = membership(1, CommunityRole::Member);
        assert!(!can_moderate_request(&moderator, Some(&m), &request(20, 1, HelpRequestStatus::Open)));
        // superadmin is unscoped
        assert!(can_moderate_request(&user(1, true), None, &request(20, 2, HelpRequestStatus::Open)));
    }

    #[test]
    fn manage_community_flag() {
        assert!(can_manage_community(&user(1, true), None));
        assert!(can_manage_community(
            &user(1, false),
            Some(&membership(1, CommunityRole::Moderator))
        ));
        assert!(!can_manage_community(
            &user(1, false),
            Some(&membership(1, CommunityRole::Member))
        ));
        assert!(!can_manage_community(&user(1, false), None));
        assert!(can_manage_reports(&user(1, true), None));
    }

    #[test]
    fn loan_capabilities_follow_owner_and_status() {
        let owner = user(10, false);
        let other = user(11, false);

        let available = item(10, LoanItemStatus::Available);
        assert!(can_request_loan(&other, &available));
        assert!(!can_request_loan(&owner, &available));
        assert!(!can_request_loan(&other, &item(10, LoanItemStatus::Loaned)));

        assert!(can_manage_loan_item(&owner, &available));
        assert!(!can_manage_loan_item(&other, &available));

        assert!(!can_mark_returned(&owner, &available));
        assert!(can_mark_returned(&owner, &item(10, LoanItemStatus::Loaned)));
        assert!(!can_mark_returned(&other, &item(10, LoanItemStatus::Loaned)));
    }
}
