//! CustomResourceDefinitions for the record kinds.

use kube::CustomResourceExt;
use synop_api::{Riot, Synapse, SynapseWorker};

/// All three CRDs as a multi-document YAML stream.
pub fn crd_documents() -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for crd in [Synapse::crd(), SynapseWorker::crd(), Riot::crd()] {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}
