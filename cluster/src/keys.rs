/// KV key layout for the clustering core.
///
/// Every key is scoped under a namespace (one per project).
///
/// ```text
/// {ns}:fb:{id}              → hash  feedback record (+ clustered, cluster_id)
/// {ns}:fb:all               → set   every feedback id
/// {ns}:fb:unclustered       → set   backlog of ids awaiting clustering
/// {ns}:emb:{id}             → bytes JSON float array (embedding cache)
/// {ns}:cl:{id}              → hash  cluster record
/// {ns}:cl:{id}:members      → set   member feedback ids
/// {ns}:clusters             → set   every cluster id
/// {ns}:job:{id}             → bytes JSON job record
/// {ns}:jobs                 → set   every job id
/// ```
pub fn feedback_key(ns: &str, id: &str) -> String {
    format!("{ns}:fb:{id}")
}

pub fn feedback_index_key(ns: &str) -> String {
    format!("{ns}:fb:all")
}

pub fn backlog_key(ns: &str) -> String {
    format!("{ns}:fb:unclustered")
}

pub fn embedding_key(ns: &str, id: &str) -> String {
    format!("{ns}:emb:{id}")
}

pub fn cluster_key(ns: &str, id: &str) -> String {
    format!("{ns}:cl:{id}")
}

pub fn members_key(ns: &str, id: &str) -> String {
    format!("{ns}:cl:{id}:members")
}

pub fn cluster_index_key(ns: &str) -> String {
    format!("{ns}:clusters")
}

pub fn job_key(ns: &str, id: &str) -> String {
    format!("{ns}:job:{id}")
}

pub fn job_index_key(ns: &str) -> String {
    format!("{ns}:jobs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(feedback_key("p1", "abc"), "p1:fb:abc");
        assert_eq!(backlog_key("p1"), "p1:fb:unclustered");
        assert_eq!(embedding_key("p1", "abc"), "p1:emb:abc");
        assert_eq!(members_key("p1", "c9"), "p1:cl:c9:members");
        assert_eq!(cluster_index_key("p1"), "p1:clusters");
        assert_eq!(job_key("p1", "j1"), "p1:job:j1");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        assert_ne!(cluster_key("a", "x"), cluster_key("b", "x"));
    }
}
