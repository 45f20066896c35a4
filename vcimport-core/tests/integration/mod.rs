mod cluster_import;
mod datastore_import;
mod discovery_tests;
mod fixtures;
mod image_import;
mod network_import;
mod template_import;
