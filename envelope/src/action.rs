//! Action list (spec §4.D): the ordered list of crypto operations an
//! envelope applies to its payload, grounded in the `Stackable` writer
//! chain `dirkz-sequoia/openpgp/src/serialize/stream.rs` composes, but
//! here modeled as data (kind + handle) rather than as nested writers, so
//! the same list drives both the encode push FSM and the decode pop FSM.

use crypto_core::{HashAlgorithm, SymmetricAlgorithm};

/// The operation an [`Action`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionKind {
    /// Public-key or conventional (password-based) key exchange, wrapping
    /// the main encrypt action's session key.
    Keyex,
    /// Compression, always a pre/main action preceding encryption.
    Compress,
    /// A running hash, either standalone (signed content) or as input to a
    /// MAC.
    Hash,
    /// A keyed MAC over the payload.
    Mac,
    /// Bulk symmetric encryption of the payload.
    Encrypt,
    /// A signature over one of the envelope's hash actions.
    Sign,
}

/// A handle to the external crypto context performing one [`Action`].
///
/// The action list only needs to compare, wrap, and move these handles; it
/// never inspects their contents, matching the binding-layer boundary in
/// spec §4.C.
#[derive(Debug, Clone)]
pub enum CryptoHandle {
    /// A symmetric key-wrap/unwrap or bulk-cipher context, named by
    /// algorithm so duplicate detection (spec §4.D) can compare algorithms
    /// without touching key material.
    Symmetric(SymmetricAlgorithm),
    /// A hash or MAC context, named by algorithm.
    Hash(HashAlgorithm),
    /// A public-key context, identified by a key ID (an opaque byte
    /// string in this layer; certificate parsing lives outside the
    /// envelope engine).
    PublicKey(Vec<u8>),
}

/// One entry in an envelope's action list.
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub handle: CryptoHandle,
    /// Index of a controller action in the same list (a keyex action
    /// wrapping this action's session key), if any. Invariant: a
    /// controller's kind always sorts before its subject's kind.
    pub controller: Option<usize>,
    /// Set when this action still needs a controller before the envelope
    /// can proceed (e.g. an encrypt action with no keyex yet).
    pub needs_controller: bool,
    /// Set when this action was created implicitly (e.g. a hash action
    /// auto-added alongside a sign action) rather than by an explicit
    /// caller call. A later explicit `add` of an equivalent action clears
    /// this flag instead of reporting a duplicate.
    pub added_automatically: bool,
    /// Cached encoded size of this action's wire contribution (a keyex
    /// recipient-info, a signature), used to pre-size variable-length
    /// headers before the bytes exist.
    pub encoded_size: Option<usize>,
}

/// Outcome of [`ActionList::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was appended at this index.
    Added(usize),
    /// An equivalent entry already existed and has now been confirmed
    /// (its `added_automatically` flag cleared if it was set).
    Confirmed(usize),
    /// An equivalent entry already existed and was already explicit,
    /// not `added_automatically` — this is a genuine duplicate.
    Duplicate,
}

/// An append-only, kind-sorted list of [`Action`]s.
///
/// Sorted insertion means a linear scan finds the first entry of a kind
/// and can stop at the first entry of a different kind, per spec §4.D.
#[derive(Debug, Clone, Default)]
pub struct ActionList {
    actions: Vec<Action>,
}

fn is_duplicate(a: &Action, kind: ActionKind, handle: &CryptoHandle) -> bool {
    if a.kind != kind {
        return false;
    }
    match (&a.handle, handle) {
        (CryptoHandle::PublicKey(id1), CryptoHandle::PublicKey(id2)) => {
            // Conventional (password) keyex actions never dedupe; only
            // PKC keyex/sign actions do, and those are always identified
            // by key ID in this representation.
            kind != ActionKind::Keyex || (!id1.is_empty() && id1 == id2)
        }
        (CryptoHandle::Hash(h1), CryptoHandle::Hash(h2)) => h1 == h2,
        (CryptoHandle::Symmetric(s1), CryptoHandle::Symmetric(s2)) => s1 == s2,
        _ => false,
    }
}

impl ActionList {
    /// An empty action list.
    pub fn new() -> Self {
        ActionList::default()
    }

    /// All actions, in kind-sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Adds an action of `kind` using `handle`. Conventional keyex actions
    /// (a `Symmetric` handle under `ActionKind::Keyex`) are never treated
    /// as duplicates, since a caller may legitimately stack several with
    /// distinct KDF parameters.
    pub fn add(&mut self, kind: ActionKind, handle: CryptoHandle, added_automatically: bool) -> AddOutcome {
        let conventional_keyex = kind == ActionKind::Keyex && matches!(handle, CryptoHandle::Symmetric(_));
        if !conventional_keyex {
            if let Some(idx) = self
                .actions
                .iter()
                .position(|a| is_duplicate(a, kind, &handle))
            {
                if self.actions[idx].added_automatically {
                    self.actions[idx].added_automatically = false;
                    return AddOutcome::Confirmed(idx);
                }
                return AddOutcome::Duplicate;
            }
        }

        let insert_at = self
            .actions
            .iter()
            .position(|a| a.kind > kind)
            .unwrap_or(self.actions.len());
        self.actions.insert(
            insert_at,
            Action {
                kind,
                handle,
                controller: None,
                needs_controller: false,
                added_automatically,
                encoded_size: None,
            },
        );
        AddOutcome::Added(insert_at)
    }

    /// Finds the first action of the given kind.
    pub fn find(&self, kind: ActionKind) -> Option<&Action> {
        self.actions.iter().find(|a| a.kind == kind)
    }

    /// Finds the first action of the given kind, mutably.
    pub fn find_mut(&mut self, kind: ActionKind) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.kind == kind)
    }

    /// All actions of the given kind.
    pub fn find_all(&self, kind: ActionKind) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    /// Removes the action at `index`.
    pub fn delete(&mut self, index: usize) {
        self.actions.remove(index);
    }

    /// Drops subject actions still flagged `needs_controller`: a hash
    /// action auto-added alongside a signature that the caller
    /// subsequently overrode with an explicit, different hash.
    pub fn delete_unused(&mut self) {
        self.actions.retain(|a| !a.needs_controller);
    }

    /// Number of actions in the list.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the list has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_hash_action_rejected() {
        let mut list = ActionList::new();
        list.add(
            ActionKind::Hash,
            CryptoHandle::Hash(HashAlgorithm::Sha1),
            false,
        );
        let outcome = list.add(
            ActionKind::Hash,
            CryptoHandle::Hash(HashAlgorithm::Sha1),
            false,
        );
        assert_eq!(outcome, AddOutcome::Duplicate);
    }

    #[test]
    fn auto_added_action_confirmed_not_duplicated() {
        let mut list = ActionList::new();
        list.add(
            ActionKind::Hash,
            CryptoHandle::Hash(HashAlgorithm::Sha1),
            true,
        );
        let outcome = list.add(
            ActionKind::Hash,
            CryptoHandle::Hash(HashAlgorithm::Sha1),
            false,
        );
        assert!(matches!(outcome, AddOutcome::Confirmed(_)));
        assert!(!list.find(ActionKind::Hash).unwrap().added_automatically);
    }

    #[test]
    fn conventional_keyex_actions_never_dedupe() {
        let mut list = ActionList::new();
        list.add(
            ActionKind::Keyex,
            CryptoHandle::Symmetric(SymmetricAlgorithm::Aes128),
            false,
        );
        let outcome = list.add(
            ActionKind::Keyex,
            CryptoHandle::Symmetric(SymmetricAlgorithm::Aes128),
            false,
        );
        assert!(matches!(outcome, AddOutcome::Added(_)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn actions_stay_sorted_by_kind() {
        let mut list = ActionList::new();
        list.add(ActionKind::Sign, CryptoHandle::PublicKey(vec![1]), false);
        list.add(
            ActionKind::Hash,
            CryptoHandle::Hash(HashAlgorithm::Sha1),
            false,
        );
        let kinds: Vec<_> = list.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Hash, ActionKind::Sign]);
    }
}
