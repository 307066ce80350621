//! Content list (spec §4.E): on decode, the list of parsed info objects
//! (one per group — a recipient-info, a signer-info) the caller must
//! resolve before the payload can be fully processed.

/// A resource the caller must supply before the envelope can proceed past
/// a [`crate::error::Error::MissingResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Password,
    PrivateKey,
    SessionKey,
    Signature,
    SignatureCheckKey,
}

/// The kind of object one content-list group describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A recipient-info: either a public-key or password-based key
    /// exchange wrapping the session key.
    RecipientInfo,
    /// A signer-info: one signature over the envelope's payload.
    SignerInfo,
}

/// Per-group virtual attributes a cursor can navigate to, in order.
/// Signature groups expose all four; recipient-info groups only expose
/// `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Result,
    SignerKey,
    ExtraData,
    Timestamp,
}

/// The cached verdict of a resolved signature check, kept so repeated
/// queries are referentially transparent as the caller navigates the
/// cursor back and forth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Bad,
    /// Verification couldn't run (no signature-check key bound yet).
    Unresolved,
}

/// Encryption parameters carried by a recipient-info group.
#[derive(Debug, Clone)]
pub struct EncryptionParams {
    pub algorithm: crypto_core::SymmetricAlgorithm,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub kdf_iterations: u32,
}

/// Signature parameters carried by a signer-info group.
#[derive(Debug, Clone)]
pub struct SignatureParams {
    pub hash_algorithm: crypto_core::HashAlgorithm,
    pub key_id: Vec<u8>,
    pub issuer_and_serial: Option<Vec<u8>>,
    pub authenticated_attributes: Option<Vec<u8>>,
}

/// Kind-specific payload of one content-list group.
#[derive(Debug, Clone)]
pub enum GroupPayload {
    Encryption(EncryptionParams),
    Signature(SignatureParams),
}

/// One group (one info object) in the content list.
#[derive(Debug, Clone)]
pub struct Group {
    pub kind: GroupKind,
    pub payload: GroupPayload,
    pub processed: bool,
    pub cached_verdict: Option<Verdict>,
    pub required: Vec<ResourceKind>,
}

impl Group {
    /// The resource the caller must still supply, if any, and whether a
    /// cached result can already satisfy the current query without
    /// needing a new crypto handle.
    pub fn first_required(&self) -> Option<ResourceKind> {
        self.required.first().copied()
    }

    /// Marks a resource as satisfied, removing it from the required list.
    pub fn resolve(&mut self, kind: ResourceKind) {
        self.required.retain(|r| *r != kind);
    }
}

/// A doubly-traversable list of content groups with an external two-axis
/// cursor: between groups, and within the selected group's virtual
/// attribute sequence.
#[derive(Debug, Clone, Default)]
pub struct ContentList {
    groups: Vec<Group>,
    cursor_group: usize,
    cursor_attr: usize,
}

/// The fixed attribute sequence signature groups expose; the cursor skips
/// whichever of these are absent for the selected group.
const SIGNATURE_ATTRS: [Attribute; 4] = [
    Attribute::Result,
    Attribute::SignerKey,
    Attribute::ExtraData,
    Attribute::Timestamp,
];

impl ContentList {
    /// An empty content list.
    pub fn new() -> Self {
        ContentList::default()
    }

    /// Appends a new group, returning its index.
    pub fn push(&mut self, group: Group) -> usize {
        self.groups.push(group);
        self.groups.len() - 1
    }

    /// All groups.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The group currently selected by the cursor.
    pub fn current(&self) -> Option<&Group> {
        self.groups.get(self.cursor_group)
    }

    /// The group currently selected by the cursor, mutably.
    pub fn current_mut(&mut self) -> Option<&mut Group> {
        self.groups.get_mut(self.cursor_group)
    }

    /// Moves the cursor to the next group, resetting the attribute axis.
    /// Returns `false` if already at the last group.
    pub fn next_group(&mut self) -> bool {
        if self.cursor_group + 1 < self.groups.len() {
            self.cursor_group += 1;
            self.cursor_attr = 0;
            true
        } else {
            false
        }
    }

    /// Moves the cursor to the next present attribute within the current
    /// group, skipping absent ones. Returns `None` once the group's
    /// attributes are exhausted.
    pub fn next_attribute(&mut self) -> Option<Attribute> {
        let group = self.groups.get(self.cursor_group)?;
        let sequence: &[Attribute] = match group.kind {
            GroupKind::SignerInfo => &SIGNATURE_ATTRS,
            GroupKind::RecipientInfo => &SIGNATURE_ATTRS[..1],
        };
        while self.cursor_attr < sequence.len() {
            let attr = sequence[self.cursor_attr];
            self.cursor_attr += 1;
            if Self::attribute_present(group, attr) {
                return Some(attr);
            }
        }
        None
    }

    fn attribute_present(group: &Group, attr: Attribute) -> bool {
        match (&group.payload, attr) {
            (GroupPayload::Signature(_), _) => true,
            (GroupPayload::Encryption(_), Attribute::Result) => true,
            (GroupPayload::Encryption(_), _) => false,
        }
    }

    /// Attempts to auto-resolve the first required resource of the current
    /// group from the given available material, returning the resolved
    /// kind if progress was made. Mirrors the envelope's attempt to pull a
    /// signature-check key from an attached certificate chain before
    /// asking the caller (spec §4.E).
    pub fn try_auto_resolve(&mut self, available: &[ResourceKind]) -> Option<ResourceKind> {
        let group = self.current_mut()?;
        let need = group.first_required()?;
        if available.contains(&need) {
            group.resolve(need);
            Some(need)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer_group(required: Vec<ResourceKind>) -> Group {
        Group {
            kind: GroupKind::SignerInfo,
            payload: GroupPayload::Signature(SignatureParams {
                hash_algorithm: crypto_core::HashAlgorithm::Sha1,
                key_id: vec![1, 2, 3],
                issuer_and_serial: None,
                authenticated_attributes: None,
            }),
            processed: false,
            cached_verdict: None,
            required,
        }
    }

    #[test]
    fn cursor_walks_signature_attributes_in_order() {
        let mut list = ContentList::new();
        list.push(signer_group(vec![]));
        let mut seen = Vec::new();
        while let Some(attr) = list.next_attribute() {
            seen.push(attr);
        }
        assert_eq!(
            seen,
            vec![
                Attribute::Result,
                Attribute::SignerKey,
                Attribute::ExtraData,
                Attribute::Timestamp,
            ]
        );
    }

    #[test]
    fn auto_resolve_clears_required_resource() {
        let mut list = ContentList::new();
        list.push(signer_group(vec![ResourceKind::SignatureCheckKey]));
        let resolved = list.try_auto_resolve(&[ResourceKind::SignatureCheckKey]);
        assert_eq!(resolved, Some(ResourceKind::SignatureCheckKey));
        assert!(list.current().unwrap().required.is_empty());
    }

    #[test]
    fn next_group_resets_attribute_cursor() {
        let mut list = ContentList::new();
        list.push(signer_group(vec![]));
        list.push(signer_group(vec![]));
        list.next_attribute();
        list.next_attribute();
        assert!(list.next_group());
        assert_eq!(list.next_attribute(), Some(Attribute::Result));
    }
}
