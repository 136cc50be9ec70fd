//! Integration tests: CSV table -> pipeline -> MMDB -> maxminddb reader.

use k2geoip::mmdb::{IpVersion, MmdbOptions, MmdbWriter, RecordSize};
use k2geoip::{
    Error, ErrorPolicy, GeneratorConfig, IngestStats, Pipeline, RangeError, SinkError, TableReader,
};
use maxminddb::geoip2;
use maxminddb::{MaxMindDBError, Reader};
use std::net::IpAddr;

const COUNTRY_CSV: &str = "\
start_ip,end_ip,country,country_name,continent,continent_name
1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania
1.0.1.0,1.0.3.255,CN,China,AS,Asia
10.0.0.1,10.0.0.10,DE,Germany,EU,Europe
2001:db8::,2001:db8:ffff:ffff:ffff:ffff:ffff:ffff,JP,Japan,AS,Asia
2a00:1450::,2a00:1450::ff,IE,Ireland,EU,Europe
";

fn build(csv: &str, options: MmdbOptions) -> (Vec<u8>, IngestStats) {
    let table = TableReader::from_reader(csv.as_bytes()).unwrap();
    let mut writer = MmdbWriter::new(options);
    let stats = Pipeline::default().run(table.rows(), &mut writer).unwrap();
    (writer.write().unwrap(), stats)
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn country_code(reader: &Reader<Vec<u8>>, addr: &str) -> Option<String> {
    match reader.lookup::<geoip2::Country>(ip(addr)) {
        Ok(record) => record
            .country
            .and_then(|c| c.iso_code)
            .map(str::to_string),
        Err(MaxMindDBError::AddressNotFoundError(_)) => None,
        Err(e) => panic!("lookup of {} failed: {}", addr, e),
    }
}

fn prefix_len(reader: &Reader<Vec<u8>>, addr: &str) -> usize {
    let (_, prefix_len): (geoip2::Country, usize) = reader.lookup_prefix(ip(addr)).unwrap();
    prefix_len
}

#[test]
fn test_country_database_roundtrip() {
    let (data, stats) = build(COUNTRY_CSV, MmdbOptions::default());
    assert_eq!(stats.rows, 5);
    // 1 + 2 + 5 IPv4 blocks, 1 + 1 IPv6 blocks
    assert_eq!(stats.v4_blocks, 8);
    assert_eq!(stats.v6_blocks, 2);

    let reader = Reader::from_source(data).unwrap();

    let record: geoip2::Country = reader.lookup(ip("1.0.0.1")).unwrap();
    let country = record.country.unwrap();
    assert_eq!(country.iso_code, Some("AU"));
    assert_eq!(country.names.unwrap().get("en"), Some(&"Australia"));
    let continent = record.continent.unwrap();
    assert_eq!(continent.code, Some("OC"));
    assert_eq!(continent.names.unwrap().get("en"), Some(&"Oceania"));

    assert_eq!(country_code(&reader, "1.0.2.5").as_deref(), Some("CN"));
    assert_eq!(country_code(&reader, "10.0.0.1").as_deref(), Some("DE"));
    assert_eq!(country_code(&reader, "10.0.0.10").as_deref(), Some("DE"));
    assert_eq!(country_code(&reader, "2001:db8:1234::1").as_deref(), Some("JP"));
    assert_eq!(country_code(&reader, "2a00:1450::80").as_deref(), Some("IE"));
}

#[test]
fn test_range_edges_are_exact() {
    let (data, _) = build(COUNTRY_CSV, MmdbOptions::default());
    let reader = Reader::from_source(data).unwrap();

    assert_eq!(country_code(&reader, "10.0.0.0"), None);
    assert_eq!(country_code(&reader, "10.0.0.11"), None);
    assert_eq!(country_code(&reader, "0.255.255.255"), None);
    assert_eq!(country_code(&reader, "1.0.4.0"), None);
    assert_eq!(country_code(&reader, "2001:db9::"), None);
    assert_eq!(country_code(&reader, "2a00:1450::100"), None);
    assert_eq!(country_code(&reader, "8.8.8.8"), None);
}

#[test]
fn test_prefix_lengths_match_blocks() {
    let (data, _) = build(COUNTRY_CSV, MmdbOptions::default());
    let reader = Reader::from_source(data).unwrap();

    assert_eq!(prefix_len(&reader, "1.0.0.200"), 24);
    assert_eq!(prefix_len(&reader, "1.0.1.1"), 24);
    assert_eq!(prefix_len(&reader, "1.0.3.1"), 23);
    assert_eq!(prefix_len(&reader, "10.0.0.1"), 32);
    assert_eq!(prefix_len(&reader, "10.0.0.5"), 30);
    assert_eq!(prefix_len(&reader, "2001:db8::1"), 32);
    assert_eq!(prefix_len(&reader, "2a00:1450::1"), 120);
}

#[test]
fn test_ipv4_aliases() {
    let (data, _) = build(COUNTRY_CSV, MmdbOptions::default());
    let reader = Reader::from_source(data).unwrap();

    // IPv4-mapped
    assert_eq!(country_code(&reader, "::ffff:1.0.0.1").as_deref(), Some("AU"));
    assert_eq!(prefix_len(&reader, "::ffff:1.0.0.1"), 120);
    // 6to4
    assert_eq!(country_code(&reader, "2002:100:201::").as_deref(), Some("CN"));
    assert_eq!(prefix_len(&reader, "2002:100:201::"), 39);
    // Teredo server address
    assert_eq!(country_code(&reader, "2001:0:100:1::").as_deref(), Some("AU"));
    assert_eq!(prefix_len(&reader, "2001:0:100:1::"), 56);
    // IPv4-compatible
    assert_eq!(country_code(&reader, "::10.0.0.4").as_deref(), Some("DE"));
}

const ALIASED_CSV: &str = "\
start_ip,end_ip,country,country_name,continent,continent_name
1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania
2002::,2002:ffff:ffff:ffff:ffff:ffff:ffff:ffff,JP,Japan,AS,Asia
::ffff:0:0,::ffff:ffff:ffff,DE,Germany,EU,Europe
";

#[test]
fn test_rows_in_aliased_networks_are_rejected() {
    let table = TableReader::from_reader(ALIASED_CSV.as_bytes()).unwrap();
    let mut writer = MmdbWriter::default();
    let err = Pipeline::new(ErrorPolicy::Skip)
        .run(table.rows(), &mut writer)
        .unwrap_err();

    match err {
        Error::Sink { block, record, source } => {
            assert_eq!(block.to_string(), "2002::/16");
            assert_eq!(record.country_code, "JP");
            assert!(matches!(
                source.downcast_ref::<SinkError>(),
                Some(SinkError::AliasedNetwork { .. })
            ));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(writer.inserted(), 1);
}

#[test]
fn test_rows_in_alias_networks_kept_without_aliasing() {
    let options = MmdbOptions {
        ipv4_aliasing: false,
        ..MmdbOptions::default()
    };
    let (data, stats) = build(ALIASED_CSV, options);
    assert_eq!(stats.blocks, 3);

    let reader = Reader::from_source(data).unwrap();
    assert_eq!(country_code(&reader, "1.0.0.1").as_deref(), Some("AU"));
    assert_eq!(country_code(&reader, "2002:5555::1").as_deref(), Some("JP"));
    assert_eq!(country_code(&reader, "::ffff:8.8.8.8").as_deref(), Some("DE"));
}

#[test]
fn test_without_aliasing() {
    let options = MmdbOptions {
        ipv4_aliasing: false,
        ..MmdbOptions::default()
    };
    let (data, _) = build(COUNTRY_CSV, options);
    let reader = Reader::from_source(data).unwrap();

    assert_eq!(country_code(&reader, "1.0.0.1").as_deref(), Some("AU"));
    assert_eq!(country_code(&reader, "::ffff:1.0.0.1"), None);
    assert_eq!(country_code(&reader, "2002:100:1::"), None);
}

#[test]
fn test_metadata() {
    let options = MmdbOptions {
        build_epoch: Some(1_700_000_000),
        ..MmdbOptions::default()
    };
    let (data, _) = build(COUNTRY_CSV, options);
    let reader = Reader::from_source(data).unwrap();

    let metadata = &reader.metadata;
    assert_eq!(metadata.binary_format_major_version, 2);
    assert_eq!(metadata.binary_format_minor_version, 0);
    assert_eq!(metadata.build_epoch, 1_700_000_000);
    assert_eq!(metadata.database_type, "ipinfo country.mmdb");
    assert_eq!(metadata.description.get("en").map(String::as_str), Some("ipinfo country.mmdb"));
    assert_eq!(metadata.languages, ["en"]);
    assert_eq!(metadata.ip_version, 6);
    assert_eq!(metadata.record_size, 24);
    assert!(metadata.node_count > 0);
}

#[test]
fn test_all_record_sizes() {
    for record_size in [RecordSize::Bits24, RecordSize::Bits28, RecordSize::Bits32] {
        let options = MmdbOptions {
            record_size,
            ..MmdbOptions::default()
        };
        let (data, _) = build(COUNTRY_CSV, options);
        let reader = Reader::from_source(data).unwrap();

        assert_eq!(reader.metadata.record_size, record_size.bits());
        assert_eq!(country_code(&reader, "1.0.2.5").as_deref(), Some("CN"));
        assert_eq!(country_code(&reader, "2001:db8::1").as_deref(), Some("JP"));
        assert_eq!(country_code(&reader, "::ffff:10.0.0.3").as_deref(), Some("DE"));
        assert_eq!(country_code(&reader, "10.0.0.11"), None);
    }
}

#[test]
fn test_ipv4_only_database() {
    let csv = "\
start_ip,end_ip,country,country_name,continent,continent_name
1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania
";
    let options = MmdbOptions {
        ip_version: IpVersion::V4,
        ..MmdbOptions::default()
    };
    let (data, _) = build(csv, options);
    let reader = Reader::from_source(data).unwrap();

    assert_eq!(reader.metadata.ip_version, 4);
    assert_eq!(country_code(&reader, "1.0.0.7").as_deref(), Some("AU"));
    assert_eq!(prefix_len(&reader, "1.0.0.7"), 24);
}

#[test]
fn test_ipv6_row_in_ipv4_database_fails() {
    let table = TableReader::from_reader(COUNTRY_CSV.as_bytes()).unwrap();
    let mut writer = MmdbWriter::new(MmdbOptions {
        ip_version: IpVersion::V4,
        ..MmdbOptions::default()
    });
    let err = Pipeline::default().run(table.rows(), &mut writer).unwrap_err();

    match err {
        Error::Sink { block, record, .. } => {
            assert_eq!(block.to_string(), "2001:db8::/32");
            assert_eq!(record.country_code, "JP");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_later_rows_override_earlier() {
    let csv = "\
start_ip,end_ip,country,country_name,continent,continent_name
10.0.0.0,10.255.255.255,US,United States,NA,North America
10.1.0.0,10.1.255.255,CA,Canada,NA,North America
";
    let (data, _) = build(csv, MmdbOptions::default());
    let reader = Reader::from_source(data).unwrap();

    assert_eq!(country_code(&reader, "10.0.0.1").as_deref(), Some("US"));
    assert_eq!(country_code(&reader, "10.1.2.3").as_deref(), Some("CA"));
    assert_eq!(country_code(&reader, "10.2.0.0").as_deref(), Some("US"));
    assert_eq!(prefix_len(&reader, "10.1.2.3"), 16);
}

#[test]
fn test_missing_field_fails_before_insert() {
    let csv = "\
start_ip,end_ip,country,country_name,continent
1.0.0.0,1.0.0.255,AU,Australia,OC
";
    match TableReader::from_reader(csv.as_bytes()) {
        Err(Error::MissingField(name)) => assert_eq!(name, "continent_name"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected missing field error"),
    }
}

#[test]
fn test_invalid_row_aborts() {
    let csv = "\
start_ip,end_ip,country,country_name,continent,continent_name
1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania
1.0.1.0,2001:db8::1,CN,China,AS,Asia
";
    let table = TableReader::from_reader(csv.as_bytes()).unwrap();
    let mut writer = MmdbWriter::default();
    let err = Pipeline::default().run(table.rows(), &mut writer).unwrap_err();

    assert!(matches!(
        err,
        Error::Row {
            line: 3,
            source: RangeError::FamilyMismatch { .. },
            ..
        }
    ));
    assert_eq!(writer.inserted(), 1);
}

#[test]
fn test_skip_policy_from_config() {
    let csv = "\
start_ip,end_ip,country,country_name,continent,continent_name
1.0.0.0,1.0.0.255,AU,Australia,OC,Oceania
1.0.1.255,1.0.1.0,CN,China,AS,Asia
not-an-ip,1.0.2.0,CN,China,AS,Asia
2001:db8::,2001:db8::ff,JP,Japan,AS,Asia
";
    let config = GeneratorConfig::from_yaml_str("skip_invalid_rows: true\nrecord_size: 28\n").unwrap();
    assert_eq!(config.error_policy(), ErrorPolicy::Skip);

    let table = TableReader::from_reader(csv.as_bytes()).unwrap();
    let mut writer = MmdbWriter::new(config.mmdb_options().unwrap());
    let stats = Pipeline::new(config.error_policy())
        .run(table.rows(), &mut writer)
        .unwrap();

    assert_eq!(stats.rows, 4);
    assert_eq!(stats.skipped_rows, 2);
    assert_eq!(stats.blocks, 2);

    let reader = Reader::from_source(writer.write().unwrap()).unwrap();
    assert_eq!(reader.metadata.record_size, 28);
    assert_eq!(country_code(&reader, "1.0.1.1"), None);
    assert_eq!(country_code(&reader, "2001:db8::1").as_deref(), Some("JP"));
}

#[test]
fn test_gzip_table_file() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("country.csv.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(COUNTRY_CSV.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let table = TableReader::open(&path).unwrap();
    let mut writer = MmdbWriter::default();
    Pipeline::default().run(table.rows(), &mut writer).unwrap();

    let out = dir.path().join("country.mmdb");
    let mut file = std::fs::File::create(&out).unwrap();
    writer.write_to(&mut file).unwrap();
    drop(file);

    let reader = Reader::open_readfile(&out).unwrap();
    assert_eq!(country_code(&reader, "1.0.0.1").as_deref(), Some("AU"));
}
