use super::*;

fn parent() -> User {
    User {
        id: "7".into(),
        username: "mom".into(),
        email: Some("mom@example.com".into()),
        user_type: UserType::Parent,
        profile_id: Some("p-1".into()),
    }
}

// =============================================================================
// UserType
// =============================================================================

#[test]
fn user_type_parses_case_insensitively() {
    assert_eq!("PARENT".parse::<UserType>().unwrap(), UserType::Parent);
    assert_eq!("child".parse::<UserType>().unwrap(), UserType::Child);
    assert!("TEACHER".parse::<UserType>().is_err());
}

#[test]
fn user_type_serializes_upper_case() {
    assert_eq!(serde_json::to_string(&UserType::Child).unwrap(), "\"CHILD\"");
    assert_eq!(UserType::Parent.to_string(), "PARENT");
}

// =============================================================================
// User
// =============================================================================

#[test]
fn user_decodes_numeric_ids() {
    let json = r#"{"id": 42, "username": "jiwoo", "userType": "CHILD", "profileId": 9}"#;
    let user: User = serde_json::from_str(json).unwrap();
    assert_eq!(user.id, "42");
    assert_eq!(user.profile_id.as_deref(), Some("9"));
    assert!(user.email.is_none());
}

#[test]
fn user_empty_profile_id_is_none() {
    let json = r#"{"id": "a", "username": "b", "userType": "PARENT", "profileId": ""}"#;
    let user: User = serde_json::from_str(json).unwrap();
    assert!(user.profile_id.is_none());
}

#[test]
fn user_rejects_object_id() {
    let json = r#"{"id": {}, "username": "b", "userType": "PARENT"}"#;
    assert!(serde_json::from_str::<User>(json).is_err());
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn default_session_is_unchecked_and_empty() {
    let s = Session::default();
    assert!(!s.is_authenticated);
    assert!(!s.is_auth_checked);
    assert!(!s.is_settled());
    assert!(s.user.is_none() && s.token.is_none());
}

#[test]
fn sign_in_then_out_keeps_checked() {
    let mut s = Session::default();
    s.sign_in(parent(), "tok".into());
    assert!(s.is_authenticated && s.is_auth_checked);
    assert_eq!(s.user_type(), Some(UserType::Parent));
    s.sign_out();
    assert!(!s.is_authenticated);
    assert!(s.is_auth_checked);
    assert!(s.token.is_none());
}

// =============================================================================
// CredentialRecord
// =============================================================================

#[test]
fn all_missing_is_absent() {
    assert_eq!(CredentialRecord::from_values([None, None, None, None]), StoredCredentials::Absent);
}

#[test]
fn some_missing_is_partial() {
    let values = [Some("tok".into()), None, Some("7".into()), Some("mom".into())];
    assert_eq!(CredentialRecord::from_values(values), StoredCredentials::Partial);
}

#[test]
fn bad_user_type_is_partial() {
    let values = [Some("tok".into()), Some("ADMIN".into()), Some("7".into()), Some("mom".into())];
    assert_eq!(CredentialRecord::from_values(values), StoredCredentials::Partial);
}

#[test]
fn empty_token_is_partial() {
    let values = [Some(String::new()), Some("PARENT".into()), Some("7".into()), Some("mom".into())];
    assert_eq!(CredentialRecord::from_values(values), StoredCredentials::Partial);
}

#[test]
fn complete_record_rebuilds_user_without_profile() {
    let record = CredentialRecord::new("tok", &parent());
    let pairs = record.pairs().map(|(_, v)| Some(v));
    let StoredCredentials::Complete(restored) = CredentialRecord::from_values(pairs) else {
        panic!("expected complete record");
    };
    let user = restored.to_user();
    assert_eq!(user.id, "7");
    assert_eq!(user.username, "mom");
    assert_eq!(user.user_type, UserType::Parent);
    assert!(user.profile_id.is_none());
    assert!(user.email.is_none());
}

#[test]
fn record_debug_redacts_token() {
    let record = CredentialRecord::new("super-secret", &parent());
    let debug = format!("{record:?}");
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("mom"));
}
