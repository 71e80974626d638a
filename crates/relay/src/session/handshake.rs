use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::{AdmitError, Client, SessionRegistry};
use crate::net::{COMPATIBLE_VERSION, Handshake, PeerId, compatible_version_display};

/// Social Club names allowed to join while the allow-list policy is on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Allowlist {
    pub social_club_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Blocklist {
    pub social_club_names: Vec<String>,
    pub usernames: Vec<String>,
    pub addresses: Vec<String>,
}

/// One variant per rejection; the display text is sent to the client
/// verbatim as the denial reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("Username is empty or contains spaces!")]
    UsernameEmpty,
    #[error("Username contains special chars!")]
    UsernameInvalid,
    #[error("This Social Club name is not on the allow list!")]
    NotOnAllowlist,
    #[error("Server requires version {0}.x!")]
    IncompatibleVersion(String),
    #[error("This Social Club name has been blocked by this server!")]
    SocialClubBlocked,
    #[error("This Username has been blocked by this server!")]
    UsernameBlocked,
    #[error("This IP was blocked by this server!")]
    AddressBlocked,
    #[error("The name of the Social Club is already taken!")]
    SocialClubTaken,
    #[error("Username is already taken!")]
    UsernameTaken,
}

impl From<AdmitError> for HandshakeError {
    fn from(err: AdmitError) -> Self {
        match err {
            AdmitError::SocialClubTaken => HandshakeError::SocialClubTaken,
            AdmitError::UsernameTaken => HandshakeError::UsernameTaken,
        }
    }
}

/// Gates new connections before the registry admits them. Checks run in a
/// fixed order and the first failure decides the rejection reason.
#[derive(Debug, Default)]
pub struct HandshakeValidator {
    pub allowlist_enabled: bool,
    pub allowlist: Allowlist,
    pub blocklist: Blocklist,
}

impl HandshakeValidator {
    /// Validate `request` and, on success, insert the new client into the
    /// registry. The name-in-use probes and the insert are a single atomic
    /// registry operation.
    pub fn admit(
        &self,
        registry: &SessionRegistry,
        id: PeerId,
        request: &Handshake,
        addr: IpAddr,
    ) -> Result<Client, HandshakeError> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(HandshakeError::UsernameEmpty);
        }
        if request.username.chars().any(|c| !c.is_alphanumeric()) {
            return Err(HandshakeError::UsernameInvalid);
        }

        if self.allowlist_enabled
            && !self
                .allowlist
                .social_club_names
                .contains(&request.social_club_name)
        {
            return Err(HandshakeError::NotOnAllowlist);
        }

        if !request.mod_version.starts_with(COMPATIBLE_VERSION) {
            return Err(HandshakeError::IncompatibleVersion(
                compatible_version_display(),
            ));
        }

        if self
            .blocklist
            .social_club_names
            .contains(&request.social_club_name)
        {
            return Err(HandshakeError::SocialClubBlocked);
        }
        if self.blocklist.usernames.contains(&request.username) {
            return Err(HandshakeError::UsernameBlocked);
        }
        if self.blocklist.addresses.contains(&addr.to_string()) {
            return Err(HandshakeError::AddressBlocked);
        }

        let client = Client::new(
            id,
            request.social_club_name.clone(),
            request.username.clone(),
        );
        registry.try_admit(client.clone())?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(social_club: &str, username: &str) -> Handshake {
        Handshake {
            id: 0,
            social_club_name: social_club.to_string(),
            username: username.to_string(),
            mod_version: format!("{COMPATIBLE_VERSION}_nightly"),
            npcs_allowed: false,
        }
    }

    fn addr() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn accepts_a_clean_candidate() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator::default();

        let client = validator
            .admit(&registry, 11, &request("club", "Alpha1"), addr())
            .unwrap();

        assert_eq!(client.id, 11);
        assert!(registry.contains(11));
    }

    #[test]
    fn rejects_empty_and_whitespace_usernames() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator::default();

        for username in ["", "   "] {
            let err = validator
                .admit(&registry, 1, &request("club", username), addr())
                .unwrap_err();
            assert_eq!(err, HandshakeError::UsernameEmpty);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_non_alphanumeric_usernames() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator::default();

        for username in ["has space", "semi;colon", "tab\tchar", "d-ash", "em@il"] {
            let err = validator
                .admit(&registry, 1, &request("club", username), addr())
                .unwrap_err();
            assert_eq!(err, HandshakeError::UsernameInvalid, "for {username:?}");
        }
    }

    #[test]
    fn allowlist_gates_social_club_names_when_enabled() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator {
            allowlist_enabled: true,
            allowlist: Allowlist {
                social_club_names: vec!["vip".to_string()],
            },
            ..HandshakeValidator::default()
        };

        assert!(
            validator
                .admit(&registry, 1, &request("vip", "Alpha"), addr())
                .is_ok()
        );
        let err = validator
            .admit(&registry, 2, &request("pleb", "Bravo"), addr())
            .unwrap_err();
        assert_eq!(err, HandshakeError::NotOnAllowlist);
    }

    #[test]
    fn rejects_incompatible_mod_versions() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator::default();

        let mut candidate = request("club", "Alpha");
        candidate.mod_version = "V0_7_0_0".to_string();
        let err = validator
            .admit(&registry, 1, &candidate, addr())
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("Server requires version {}.x!", compatible_version_display())
        );
    }

    #[test]
    fn blocklist_checks_club_then_username_then_address() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator {
            blocklist: Blocklist {
                social_club_names: vec!["badclub".to_string()],
                usernames: vec!["Griefer".to_string()],
                addresses: vec!["10.0.0.9".to_string()],
            },
            ..HandshakeValidator::default()
        };

        let err = validator
            .admit(&registry, 1, &request("badclub", "Alpha"), addr())
            .unwrap_err();
        assert_eq!(err, HandshakeError::SocialClubBlocked);

        let err = validator
            .admit(&registry, 1, &request("club", "Griefer"), addr())
            .unwrap_err();
        assert_eq!(err, HandshakeError::UsernameBlocked);

        let err = validator
            .admit(
                &registry,
                1,
                &request("club", "Alpha"),
                "10.0.0.9".parse().unwrap(),
            )
            .unwrap_err();
        assert_eq!(err, HandshakeError::AddressBlocked);
    }

    #[test]
    fn second_handshake_with_taken_identity_loses() {
        let registry = SessionRegistry::new();
        let validator = HandshakeValidator::default();

        validator
            .admit(&registry, 1, &request("club", "Alpha"), addr())
            .unwrap();

        let err = validator
            .admit(&registry, 2, &request("club", "Bravo"), addr())
            .unwrap_err();
        assert_eq!(err, HandshakeError::SocialClubTaken);

        let err = validator
            .admit(&registry, 2, &request("other", "Alpha"), addr())
            .unwrap_err();
        assert_eq!(err, HandshakeError::UsernameTaken);

        assert_eq!(registry.len(), 1);
    }
}
