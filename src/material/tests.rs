#[cfg(test)]
mod units {
    use crate::material::{Material, ScatterTable};

    fn ramp_table() -> ScatterTable {
        ScatterTable {
            energies: vec![10.0, 100.0, 1000.0],
            imfp: vec![0.1, 0.2, 0.4],
            icdf: vec![
                vec![0.0, 0.5, 1.0],
                vec![0.0, 0.25, 0.5],
                vec![0.0, 0.125, 0.25],
            ],
        }
    }

    #[test]
    fn inverse_mfp_interpolates_and_clamps() {
        let table = ramp_table();
        assert_eq!(table.inverse_mfp(10.0), 0.1);
        assert!((table.inverse_mfp(55.0) - 0.15).abs() < 1e-6);
        // Outside the grid clamps to the edge rows
        assert_eq!(table.inverse_mfp(1.0), 0.1);
        assert_eq!(table.inverse_mfp(1.0e9), 0.4);
    }

    #[test]
    fn sample_walks_the_quantile_row() {
        let table = ramp_table();
        assert_eq!(table.sample(10.0, 0.0), 0.0);
        assert!((table.sample(10.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((table.sample(10.0, 1.0) - 1.0).abs() < 1e-6);
        // Quantiles above 1 clamp instead of reading out of bounds
        assert!((table.sample(10.0, 2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sample_blends_between_energy_rows() {
        let table = ramp_table();
        // Halfway between the 10 eV and 100 eV rows at the top quantile
        let mid = table.sample(55.0, 1.0);
        assert!((mid - 0.75).abs() < 1e-6);
    }

    #[test]
    fn constant_table_is_flat() {
        let table = ScatterTable::constant(0.05, 0.9);
        assert!(table.is_consistent());
        for energy in [1.0, 50.0, 5000.0] {
            assert_eq!(table.inverse_mfp(energy), 0.05);
            assert_eq!(table.sample(energy, 0.3), 0.9);
        }
    }

    #[test]
    fn consistency_checks_catch_ragged_tables() {
        let mut table = ramp_table();
        assert!(table.is_consistent());
        table.imfp.pop();
        assert!(!table.is_consistent());

        let material = Material {
            name: "pmma".to_string(),
            barrier: -1.0,
            elastic: ramp_table(),
            inelastic: ramp_table(),
        };
        assert!(!material.is_consistent());
    }

    #[test]
    fn binary_and_json_forms_decode_identically() {
        let material = Material {
            name: "silicon".to_string(),
            barrier: 4.05,
            elastic: ramp_table(),
            inelastic: ScatterTable::constant(0.02, 0.1),
        };

        let binary = bincode::serialize(&material).unwrap();
        let from_binary: Material = bincode::deserialize(&binary).unwrap();

        let json = serde_json::to_vec(&material).unwrap();
        let from_json: Material = serde_json::from_slice(&json).unwrap();

        assert_eq!(from_binary, from_json);
        assert_eq!(from_binary, material);
    }
}
