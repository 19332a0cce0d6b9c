pub mod batch_analysis; // Adaptive tiered batch analysis
