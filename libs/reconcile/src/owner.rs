//! Ownership links from children back to their desired-state record.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::error::ReconcileError;

/// Controller reference pointing at `owner`.
///
/// The platform garbage collector uses it to cascade deletion of the owner
/// to every child. Fails when the owner has not been persisted yet.
pub fn owner_reference<O>(owner: &O) -> Result<OwnerReference, ReconcileError>
where
    O: Resource<DynamicType = ()>,
{
    let mut reference = owner.controller_owner_ref(&()).ok_or_else(|| {
        ReconcileError::MalformedRecord(format!("{} has no uid", owner.name_any()))
    })?;
    reference.block_owner_deletion = Some(true);
    Ok(reference)
}

/// Make `reference` the only owner reference on `child`.
pub fn set_owner<C: Resource>(child: &mut C, reference: &OwnerReference) {
    child.meta_mut().owner_references = Some(vec![reference.clone()]);
}
