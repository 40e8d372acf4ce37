//! Enumerated catalogs the simulated fleet is drawn from.
//!
//! Every identity field of a simulated process (executable, owner, host,
//! namespace, pod prefix, container id) is picked from one of these tables.

use rand::Rng;

/// Bytes per mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Executable names assigned to simulated processes.
pub const EXEC_NAMES: &[&str] = &[
    "java_critical_payments",
    "java_critical_orders",
    "java_app_frontend",
    "java_app_backend",
    "python_api_worker",
    "python_data_processor",
    "node_gateway",
    "nginx_ingress",
    "postgres_primary",
    "custom_app_alpha",
    "custom_app_beta",
    "sidecar_envoy_proxy",
    "data_pipeline_job",
    "cache_redis_server",
    "log_aggregator_fluentbit",
    "stress-ng",
];

/// Owner account names.
pub const OWNERS: &[&str] = &[
    "payments_user",
    "orders_user",
    "app_user",
    "api_user",
    "system_user",
    "data_user",
    "infra_user",
    "phoenix_bench_user",
];

/// Host name stems, combined with a node suffix per host index.
pub const BASE_HOSTNAMES: &[&str] = &[
    "web",
    "app",
    "db",
    "cache",
    "worker",
    "stream",
    "loadgen-k8s",
];

/// Kubernetes namespaces, one picked per host.
pub const NAMESPACES: &[&str] = &[
    "prod-critical",
    "prod-apps",
    "staging-apps",
    "dev-team-a",
    "infra-services",
    "default-ns",
];

/// Pod name prefixes. The prefix doubles as the service name.
pub const POD_PREFIXES: &[&str] = &[
    "payments",
    "orders",
    "frontend",
    "backend",
    "api",
    "datajob",
    "cache-node",
    "logging-agg",
    "monitoring-agent",
    "job-runner",
];

/// Availability-zone node suffixes.
pub const NODE_SUFFIXES: &[&str] = &["az1-node", "az2-node", "az3-node"];

/// Number of pre-generated container ids.
pub const CONTAINER_ID_POOL_SIZE: usize = 150;

/// Pool of container ids shared by all simulated processes.
#[derive(Debug, Clone)]
pub struct ContainerIdPool {
    ids: Vec<String>,
}

impl ContainerIdPool {
    /// Generates `CONTAINER_ID_POOL_SIZE` ids of the form `cid-0042-<hex><hex>`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let ids = (0..CONTAINER_ID_POOL_SIZE)
            .map(|i| {
                let hi: u32 = rng.gen_range(0..0xFF_FFFF);
                let lo: u32 = rng.gen_range(0..0xFF_FFFF);
                format!("cid-{:04}-{:x}{:x}", i, hi, lo)
            })
            .collect();
        Self { ids }
    }

    /// Picks one id uniformly.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.ids[rng.gen_range(0..self.ids.len())]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|c| c == id)
    }
}

/// Uniform pick from a static catalog.
pub fn pick<R: Rng + ?Sized>(rng: &mut R, catalog: &[&'static str]) -> &'static str {
    catalog[rng.gen_range(0..catalog.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_container_pool_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = ContainerIdPool::generate(&mut rng);

        assert_eq!(pool.len(), CONTAINER_ID_POOL_SIZE);
        let first = pool.pick(&mut rng).to_string();
        assert!(first.starts_with("cid-"));
        assert!(pool.contains(&first));
    }

    #[test]
    fn test_container_pool_is_seed_stable() {
        let a = ContainerIdPool::generate(&mut StdRng::seed_from_u64(99));
        let b = ContainerIdPool::generate(&mut StdRng::seed_from_u64(99));
        assert_eq!(a.ids, b.ids);
        assert!(a.ids[3].starts_with("cid-0003-"));
    }
}
