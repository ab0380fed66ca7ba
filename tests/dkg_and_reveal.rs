//! Simulates a full N-party DKG and a private role reveal in one process,
//! calling the same crypto primitives `coordinator.rs` and `rpc/server.rs`
//! drive over the wire, but directly against each party's own context.
//! This exercises the three-round key exchange and threshold fusion
//! decryption without standing up any HTTP servers.
//!
//! Ciphertext arithmetic (`encrypt`/`add`/`negate`/`mul`) only depends on
//! the joint public/relin key, not on which party performs it, so one
//! shared `BfvBackend` stands in for "the network" here; each party's own
//! `PartyKeyShare` is what actually distinguishes its partial decryption.

use blind_mafia::config::CryptoParams;
use blind_mafia::crypto::context::CryptoContext;
use blind_mafia::crypto::{BfvBackend, FheBackend, PartyKeyShare};
use blind_mafia::dkg::protocol::DkgEngine;
use blind_mafia::roles::Role;

struct Dkg {
    backend: BfvBackend,
    secrets: Vec<PartyKeyShare>,
}

fn run_dkg(num_parties: usize) -> Dkg {
    let params = CryptoParams::default();
    let coordinator_ctx = CryptoContext::new(&params, num_parties.max(4)).expect("coordinator ctx");
    let crp_wire = coordinator_ctx.crp_to_wire();

    let ctxs: Vec<CryptoContext> = (0..num_parties)
        .map(|i| {
            if i == 0 {
                coordinator_ctx.clone()
            } else {
                CryptoContext::from_wire(&params, &crp_wire, num_parties.max(4))
                    .expect("peer ctx from shared crp")
            }
        })
        .collect();
    let secrets: Vec<PartyKeyShare> = ctxs.iter().map(PartyKeyShare::generate).collect();

    // Round 1: sequential key chain walk across all parties.
    let mut chain: Vec<String> = Vec::new();
    for (ctx, sk) in ctxs.iter().zip(&secrets) {
        chain = DkgEngine::new(ctx).round1_join(sk, chain).expect("round1 join");
    }
    let (_jpk, pk) = DkgEngine::new(&ctxs[0])
        .finalize_round1(&chain, num_parties)
        .expect("round1 finalize");

    // Round 2: every party independently produces its own contribution.
    let mut round_ones = Vec::with_capacity(num_parties);
    let mut round2_shares = Vec::with_capacity(num_parties);
    for (ctx, sk) in ctxs.iter().zip(&secrets) {
        let (round_one, wire) = DkgEngine::new(ctx).round2_generate(sk).expect("round2 generate");
        round_ones.push(round_one);
        round2_shares.push(wire);
    }
    let combined_round2 = DkgEngine::new(&ctxs[0])
        .combine_round2(&round2_shares)
        .expect("combine round2");

    // Round 3: every party finalizes against the combined round-2 share,
    // then all contributions are aggregated into one joint relin key.
    let mut round3_shares = Vec::with_capacity(num_parties);
    for ((ctx, sk), round_one) in ctxs.iter().zip(&secrets).zip(round_ones) {
        let mm = DkgEngine::new(ctx)
            .round3_finalize_self(round_one, &combined_round2, sk)
            .expect("round3 finalize self");
        round3_shares.push(mm);
    }
    let jmk = DkgEngine::new(&ctxs[0])
        .finalize_round3(round3_shares, num_parties)
        .expect("round3 finalize");

    let mut backend = BfvBackend::new(ctxs[0].clone(), pk);
    backend.install_relin_key(jmk.into_inner());

    Dkg { backend, secrets }
}

#[test]
fn dkg_completes_for_every_supported_player_count() {
    for n in 4..=6 {
        let dkg = run_dkg(n);
        assert_eq!(dkg.secrets.len(), n);
        // A trivial encrypt/fuse round trip proves the joint key is usable.
        let ct = dkg.backend.encrypt(&[7, 0, 0, 0]).expect("encrypt");
        let shares = dkg
            .secrets
            .iter()
            .enumerate()
            .map(|(i, sk)| {
                if i == 0 {
                    dkg.backend.partial_decrypt_lead(sk, &ct, i as u8).unwrap()
                } else {
                    dkg.backend.partial_decrypt_main(sk, &ct, i as u8).unwrap()
                }
            })
            .collect();
        let plain = dkg.backend.fusion_decrypt(shares).expect("fuse");
        assert_eq!(plain[0], 7);
    }
}

#[test]
fn role_reveal_recovers_exactly_the_assigned_role_and_nothing_else() {
    let dkg = run_dkg(4);
    let assigned = Role::Police;
    let ciphertext = dkg.backend.encrypt(&assigned.to_one_hot()).expect("encrypt role");

    // Player 2 is the target: every other party computes a non-lead
    // partial, player 2 itself computes the lead partial, and only the
    // fused result reveals the role.
    let target = 2usize;
    let shares = dkg
        .secrets
        .iter()
        .enumerate()
        .map(|(i, sk)| {
            if i == target {
                dkg.backend.partial_decrypt_lead(sk, &ciphertext, i as u8).expect("lead partial")
            } else {
                dkg.backend.partial_decrypt_main(sk, &ciphertext, i as u8).expect("main partial")
            }
        })
        .collect();

    let plain = dkg.backend.fusion_decrypt(shares).expect("fusion decrypt");
    assert_eq!(Role::from_one_hot(&plain), Some(assigned));
}

#[test]
fn fusion_rejects_a_share_set_with_no_lead() {
    let dkg = run_dkg(4);
    let ciphertext = dkg.backend.encrypt(&Role::Citizen.to_one_hot()).expect("encrypt");

    let shares = dkg
        .secrets
        .iter()
        .enumerate()
        .map(|(i, sk)| dkg.backend.partial_decrypt_main(sk, &ciphertext, i as u8).expect("main partial"))
        .collect();

    assert!(dkg.backend.fusion_decrypt(shares).is_err());
}

#[test]
fn fusion_rejects_a_share_set_with_two_leads() {
    let dkg = run_dkg(4);
    let ciphertext = dkg.backend.encrypt(&Role::Citizen.to_one_hot()).expect("encrypt");

    let mut shares: Vec<_> = dkg
        .secrets
        .iter()
        .enumerate()
        .map(|(i, sk)| dkg.backend.partial_decrypt_main(sk, &ciphertext, i as u8).expect("main partial"))
        .collect();
    shares[0] = dkg.backend.partial_decrypt_lead(&dkg.secrets[0], &ciphertext, 0).unwrap();
    shares[1] = dkg.backend.partial_decrypt_lead(&dkg.secrets[1], &ciphertext, 1).unwrap();

    assert!(dkg.backend.fusion_decrypt(shares).is_err());
}

#[test]
fn homomorphic_kill_formula_matches_attack_and_not_heal() {
    let dkg = run_dkg(4);
    let backend = &dkg.backend;

    // attack ⊙ (1 - heal): attacked-and-not-healed slots survive as 1,
    // everything else collapses to 0.
    let attack = backend.encrypt(&[1, 0, 1, 0]).expect("encrypt attack");
    let heal = backend.encrypt(&[0, 0, 1, 0]).expect("encrypt heal");
    let one = backend.encrypt(&[1, 1, 1, 1]).expect("encrypt ones");

    let not_heal = backend.add(&one, &backend.negate(&heal).unwrap()).unwrap();
    let killed_ct = backend.mul(&attack, &not_heal).unwrap();

    let shares = dkg
        .secrets
        .iter()
        .enumerate()
        .map(|(i, sk)| {
            if i == 0 {
                backend.partial_decrypt_lead(sk, &killed_ct, i as u8).expect("lead partial")
            } else {
                backend.partial_decrypt_main(sk, &killed_ct, i as u8).expect("main partial")
            }
        })
        .collect();

    let plain = backend.fusion_decrypt(shares).expect("fusion decrypt");
    assert_eq!(&plain[..4], &[1, 0, 0, 0]);
}
