//! End-to-end scenario runs followed by cleanup.

#[cfg(test)]
mod tests {
    use transitnet_core::scenario::{inter_region, intra_region};
    use transitnet_core::{
        AutoApprove, Outcome, Provisioner, Region, ResourceKind, Teardown, TopologyFile,
    };

    use crate::{network, poll_settings, temp_store};

    fn topology() -> TopologyFile {
        TopologyFile::parse(include_str!("../../../config/topology.yaml"))
            .expect("shipped topology parses")
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_provision_and_clean_up_intra_region() {
        let api = network();
        let (_dir, store) = temp_store("intra_region");
        let file = topology();
        let region = Region::default();
        let p = Provisioner::new(&api, &store, poll_settings());

        let outcome = intra_region::run(
            file.intra_region().expect("intra section"),
            &region,
            &p,
            &AutoApprove,
        )
        .await
        .expect("provisioning");
        assert_eq!(outcome, Outcome::Completed);

        let instances = store
            .entries()
            .into_iter()
            .filter(|(name, record)| {
                ResourceKind::classify(name, &record.id) == Some(ResourceKind::Instance)
            })
            .count();
        assert_eq!(instances, 3);

        let report = Teardown::new(&api, &store, region, poll_settings())
            .run()
            .await
            .expect("teardown");
        assert!(report.is_clean(), "{report:?}");
        assert!(store.is_empty(), "{:?}", store.entries());
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_provision_and_clean_up_inter_region() {
        let api = network();
        let (_dir, store) = temp_store("inter_region");
        let file = topology();
        let p = Provisioner::new(&api, &store, poll_settings());

        let outcome = inter_region::run(
            file.inter_region().expect("inter section"),
            &p,
            &AutoApprove,
        )
        .await
        .expect("provisioning");
        assert_eq!(outcome, Outcome::Completed);

        let peering = store.get("TGW_PEER_CONNECT").expect("peering recorded");
        assert_eq!(peering.region, Some(Region::new("us-east-1")));

        let report = Teardown::new(&api, &store, Region::default(), poll_settings())
            .run()
            .await
            .expect("teardown");
        assert!(report.is_clean(), "{report:?}");
        assert!(store.is_empty(), "{:?}", store.entries());
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_resume_from_recorded_state() {
        let api = network();
        let (dir, store) = temp_store("intra_region");
        let file = topology();
        let section = file.intra_region().expect("intra section");
        let region = Region::default();

        {
            let p = Provisioner::new(&api, &store, poll_settings());
            intra_region::create_vpcs(section, &region, &p)
                .await
                .expect("network phase");
        }
        let vpc = store.id("VPC1").expect("vpc recorded");
        drop(store);

        let store = transitnet_core::ResourceStore::open(dir.path(), "intra_region")
            .expect("reopen store");
        let p = Provisioner::new(&api, &store, poll_settings());
        let outcome = intra_region::run(section, &region, &p, &AutoApprove)
            .await
            .expect("resumed provisioning");
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(store.id("VPC1").expect("vpc still recorded"), vpc);

        let report = Teardown::new(&api, &store, region, poll_settings())
            .run()
            .await
            .expect("teardown");
        assert!(report.is_clean(), "{report:?}");
    }
}
