//! Picking the knowledge base to work with.

use std::fmt::Write;

use tracing::{error, info, warn};

use crate::contract::{Chooser, KnowledgeBase, KnowledgeBaseControl};

/// Lists knowledge bases and resolves the operator's choice to an id.
///
/// `None` means "cannot proceed": the listing failed, there is nothing to
/// choose from, or the selection was unusable. The chooser is not consulted
/// when the list is empty.
pub async fn select_knowledge_base<C, P>(control: &C, chooser: &P) -> Option<String>
where
    C: KnowledgeBaseControl + ?Sized,
    P: Chooser + ?Sized,
{
    let knowledge_bases = match control.list_knowledge_bases().await {
        Ok(kbs) => kbs,
        Err(e) => {
            error!(error = %e, "Error listing knowledge bases");
            return None;
        }
    };

    if knowledge_bases.is_empty() {
        warn!("No knowledge bases found");
        return None;
    }

    let selection = match chooser.choose(&knowledge_bases) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Invalid selection");
            return None;
        }
    };

    match selection
        .checked_sub(1)
        .and_then(|idx| knowledge_bases.get(idx))
    {
        Some(kb) => {
            info!(knowledge_base_id = %kb.id, name = %kb.name, "Knowledge base selected");
            Some(kb.id.clone())
        }
        None => {
            warn!(
                selection,
                available = knowledge_bases.len(),
                "Invalid selection"
            );
            None
        }
    }
}

/// `"{n}. {name} (ID: {id})"` per knowledge base, numbered from 1, followed
/// by its description and, unless it is `ACTIVE`, its status.
pub fn render_knowledge_bases(knowledge_bases: &[KnowledgeBase]) -> String {
    let mut out = String::new();
    for (idx, kb) in knowledge_bases.iter().enumerate() {
        let _ = writeln!(out, "{}. {} (ID: {})", idx + 1, kb.name, kb.id);
        if let Some(description) = kb.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "   {}", description);
        }
        if let Some(status) = kb.status.as_deref().filter(|s| *s != "ACTIVE") {
            let _ = writeln!(out, "   Status: {}", status);
        }
    }
    out
}
