//! Provider-level integration tests: single calls and error mapping.

#[cfg(test)]
mod tests {
    use transitnet_core::{
        IngressRule, NetworkApi, ProviderError, Provisioner, Region, RouteTarget,
    };

    use crate::{ec2_client, network, poll_settings, temp_store, test_name};

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_create_tagged_vpc_and_delete_it() {
        let api = network();
        let region = Region::default();
        let name = test_name("vpc");

        let vpc_id = api
            .create_vpc(&region, &name, "10.42.0.0/16")
            .await
            .expect("create_vpc");
        assert!(vpc_id.starts_with("vpc-"), "{vpc_id}");

        let tags = ec2_client()
            .describe_vpcs()
            .vpc_ids(&vpc_id)
            .send()
            .await
            .expect("describe_vpcs");
        let tagged = tags.vpcs()[0]
            .tags()
            .iter()
            .any(|t| t.key() == Some("Name") && t.value() == Some(name.as_str()));
        assert!(tagged, "VPC should carry Name={name}");

        api.delete_vpc(&region, &vpc_id).await.expect("delete_vpc");
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_map_missing_resources_to_not_found() {
        let api = network();
        let region = Region::default();

        let err = api
            .delete_subnet(&region, "subnet-0000000000000dead")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)), "{err}");
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_refuse_to_delete_vpc_with_subnet() {
        let api = network();
        let region = Region::default();

        let vpc_id = api
            .create_vpc(&region, &test_name("vpc"), "10.43.0.0/16")
            .await
            .expect("create_vpc");
        let subnet_id = api
            .create_subnet(&region, &test_name("subnet"), &vpc_id, "10.43.1.0/24", None)
            .await
            .expect("create_subnet");

        let err = api.delete_vpc(&region, &vpc_id).await.unwrap_err();
        assert!(matches!(err, ProviderError::DependencyViolation(_)), "{err}");

        api.delete_subnet(&region, &subnet_id).await.expect("delete_subnet");
        api.delete_vpc(&region, &vpc_id).await.expect("delete_vpc");
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_route_public_table_through_internet_gateway() {
        let api = network();
        let region = Region::default();
        let (_dir, store) = temp_store("provider");
        let p = Provisioner::new(&api, &store, poll_settings());

        p.create_vpc(&region, "VPC1", "10.44.0.0/16").await.expect("vpc");
        p.create_internet_gateway(&region, "IGW").await.expect("igw");
        p.attach_vpc_with_igw(&region, "VPC1", "IGW").await.expect("attach");
        let rtb = p
            .find_existing_route_table(&region, "VPC1_PUB_ROUTE_TABLE", "VPC1")
            .await
            .expect("main route table");
        p.create_route_with_igw(&region, "IGW", "VPC1_PUB_ROUTE_TABLE", "0.0.0.0/0")
            .await
            .expect("route");

        assert!(api.is_main_route_table(&region, &rtb).await.expect("is_main"));

        // A second attach is reported as already in place, not as a failure.
        p.attach_vpc_with_igw(&region, "VPC1", "IGW")
            .await
            .expect("repeated attach");

        let igw = store.id("IGW").expect("igw recorded");
        let vpc = store.id("VPC1").expect("vpc recorded");
        api.delete_internet_gateway(&region, &igw).await.expect("delete igw");
        api.delete_vpc(&region, &vpc).await.expect("delete vpc");
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_authorize_ingress_once() {
        let api = network();
        let region = Region::default();

        let vpc_id = api
            .create_vpc(&region, &test_name("vpc"), "10.45.0.0/16")
            .await
            .expect("create_vpc");
        let group = test_name("sg");
        let group_id = api
            .create_security_group(&region, &group, "integration test group", &vpc_id)
            .await
            .expect("create_security_group");

        let rules = [IngressRule::ssh_from_anywhere()];
        api.authorize_security_group_ingress(&region, &group_id, &rules)
            .await
            .expect("authorize");
        let err = api
            .authorize_security_group_ingress(&region, &group_id, &rules)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists(_)), "{err}");

        api.delete_security_group(&region, &group_id)
            .await
            .expect("delete sg");
        api.delete_vpc(&region, &vpc_id).await.expect("delete vpc");
    }

    #[tokio::test]
    #[ignore = "requires EC2 endpoint"]
    async fn test_should_reject_route_to_unknown_gateway() {
        let api = network();
        let region = Region::default();

        let vpc_id = api
            .create_vpc(&region, &test_name("vpc"), "10.46.0.0/16")
            .await
            .expect("create_vpc");
        let rtb = api
            .main_route_table(&region, &vpc_id)
            .await
            .expect("main route table");

        let result = api
            .create_route(
                &region,
                &rtb,
                "0.0.0.0/0",
                &RouteTarget::InternetGateway("igw-0000000000000dead".to_owned()),
            )
            .await;
        assert!(result.is_err());

        api.delete_vpc(&region, &vpc_id).await.expect("delete vpc");
    }
}
