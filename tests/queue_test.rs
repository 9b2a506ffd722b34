use landau::command::{CommandKind, RemoteCommand};
use landau::queue::CommandQueue;

#[test]
fn fifo_with_executing_slot() {
    let mut queue = CommandQueue::new();
    let commands: Vec<_> = (0..3)
        .map(|_| RemoteCommand::new(CommandKind::HonkFlash))
        .collect();
    for c in &commands {
        queue.enqueue(c.clone());
    }
    assert_eq!(queue.len(), 3);

    let first = queue.dequeue().unwrap();
    assert_eq!(first.id, commands[0].id);
    queue.set_executing(Some(first.clone()));

    assert_eq!(queue.len(), 2);
    assert!(queue.find_by_id(first.id).is_some());
    assert!(!queue.remove_by_id(first.id));
    assert!(queue.remove_by_id(commands[2].id));
    assert_eq!(
        queue.pending().iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![commands[1].id]
    );

    queue.clear();
    assert!(queue.is_empty());
    assert!(queue.executing().is_none());
}
